//! Simple single-file migration format
//!
//! This module implements a simple migration source for sqlx that loads all migrations from a single file,
//! which is embedded into the binary.
//!
//! Every migration is marked by a line comment like this:
//! ```text
//! --##1 initial schema
//! ```
//! The comment specifies the version (1) and description (initial schema).
//! Each following migration should increase the version by one.
use std::{borrow::Cow, future::Future, pin::Pin};

use sqlx::{
    error::BoxDynError,
    migrate::{Migration, MigrationSource, MigrationType},
};

const HEADER_PREFIX: &str = "--##";

#[derive(Debug)]
pub struct MigrationScript<'s> {
    data: &'s str,
}

impl<'s> MigrationSource<'s> for MigrationScript<'s> {
    fn resolve(
        self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Migration>, BoxDynError>> + Send + 's>> {
        Box::pin(async move {
            let migrations = parse_script(self.data)?
                .into_iter()
                .map(|(version, description, sql)| {
                    Migration::new(
                        version,
                        Cow::Owned(description),
                        MigrationType::Simple,
                        Cow::Owned(sql),
                    )
                })
                .collect();

            Ok(migrations)
        })
    }
}

/// Split a script into `(version, description, sql)` sections.
///
/// The sql is collected before the `Migration` is built so its checksum covers the statements.
fn parse_script(data: &str) -> Result<Vec<(i64, String, String)>, String> {
    let mut sections: Vec<(i64, String, String)> = Vec::new();

    for line in data.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix(HEADER_PREFIX) {
            let (version, description) = header.split_once(' ').unwrap_or((header, ""));
            let version = version.parse::<i64>().map_err(|e| {
                format!("cannot parse version of migration as int, got string '{version}', error: {e}")
            })?;

            if let Some((previous, _, _)) = sections.last() {
                if version <= *previous {
                    return Err(format!(
                        "migration versions must increase, got {version} after {previous}"
                    ));
                }
            }

            sections.push((version, description.trim().to_owned(), String::new()));
            continue;
        }

        match sections.last_mut() {
            Some((_, _, sql)) => {
                sql.push_str(line);
                sql.push('\n');
            }
            // allow comments at beginning of file
            None if line.starts_with("--") => continue,
            None => {
                return Err(format!(
                    "migration script does not start with migration header, got: {line}"
                ))
            }
        }
    }

    Ok(sections)
}

pub fn postgresql_migrations() -> MigrationScript<'static> {
    MigrationScript {
        data: include_str!("./sql/migrations.pg.sql"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_sections_by_header() {
        let script = "-- leading comment\n--##1 initial schema\nCREATE TABLE a (id BIGINT);\n\n--##2 second\nCREATE TABLE b (id BIGINT);\n";
        let sections = parse_script(script).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, 1);
        assert_eq!(sections[0].1, "initial schema");
        assert_eq!(sections[0].2, "CREATE TABLE a (id BIGINT);\n");
        assert_eq!(sections[1].0, 2);
        assert_eq!(sections[1].2, "CREATE TABLE b (id BIGINT);\n");
    }

    #[test]
    fn rejects_statements_before_first_header() {
        assert!(parse_script("CREATE TABLE a (id BIGINT);\n--##1 x\n").is_err());
    }

    #[test]
    fn rejects_bad_or_decreasing_versions() {
        assert!(parse_script("--##one initial\n").is_err());
        assert!(parse_script("--##2 b\nSELECT 1;\n--##1 a\nSELECT 1;\n").is_err());
    }

    #[test]
    fn embedded_script_is_valid() {
        let sections = parse_script(include_str!("./sql/migrations.pg.sql")).unwrap();
        assert!(!sections.is_empty());
        assert_eq!(sections[0].0, 1);
    }
}
