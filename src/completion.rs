//! # Shell Completion Module
//!
//! Completion scripts for `trackflow`, generated by `clap_complete`, plus
//! name suggestions taken from the catalog snapshot.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! trackflow completion bash > ~/.local/share/bash-completion/completions/trackflow
//!
//! # Generate zsh completions
//! trackflow completion zsh > ~/.config/zsh/completions/_trackflow
//! ```

use crate::catalog::{CatalogSnapshot, EntityKind};
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub const fn shell_to_completion_shell(shell: crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Entity names of `kind` in the snapshot, sorted and without duplicates.
#[must_use]
pub fn name_completions(snapshot: &CatalogSnapshot, kind: EntityKind) -> Vec<String> {
    let mut names: Vec<String> = snapshot
        .entities
        .iter()
        .filter(|e| e.kind == Some(kind) && !e.name.is_empty())
        .map(|e| e.name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Write names one per line, quoting the ones with whitespace unless the
/// shell is fish.
pub fn write_name_completions<W: Write>(out: &mut W, names: &[String], shell: Option<&str>) -> io::Result<()> {
    for name in names {
        match shell {
            Some("fish") => writeln!(out, "{name}")?,
            _ if name.contains(char::is_whitespace) => {
                writeln!(out, "\"{}\"", name.replace('"', "\\\""))?;
            }
            _ => writeln!(out, "{name}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityRecord;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(
            shell_to_completion_shell(crate::cli::Shell::Bash),
            CompletionShell::Bash
        );
        assert_eq!(
            shell_to_completion_shell(crate::cli::Shell::Zsh),
            CompletionShell::Zsh
        );
    }

    #[test]
    fn test_name_completions_filter_by_kind() {
        let record = |kind, name: &str| EntityRecord {
            kind: Some(kind),
            id: name.to_lowercase(),
            name: name.to_owned(),
            ..EntityRecord::default()
        };
        let snapshot = CatalogSnapshot {
            entities: vec![
                record(EntityKind::Playlist, "Road Trip"),
                record(EntityKind::Album, "Kind of Blue"),
                record(EntityKind::Playlist, "Focus"),
                record(EntityKind::Playlist, "Focus"),
            ],
            ..CatalogSnapshot::default()
        };
        assert_eq!(
            name_completions(&snapshot, EntityKind::Playlist),
            vec!["Focus".to_string(), "Road Trip".to_string()]
        );
    }

    #[test]
    fn test_quoting_depends_on_shell() {
        let names = vec!["Road Trip".to_string(), "Focus".to_string()];
        let mut bash = Vec::new();
        write_name_completions(&mut bash, &names, None).unwrap();
        assert_eq!(String::from_utf8(bash).unwrap(), "\"Road Trip\"\nFocus\n");

        let mut fish = Vec::new();
        write_name_completions(&mut fish, &names, Some("fish")).unwrap();
        assert_eq!(String::from_utf8(fish).unwrap(), "Road Trip\nFocus\n");
    }
}
