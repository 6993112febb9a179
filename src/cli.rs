//! Superficie de línea de comandos.

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use cp_domain::MwTimestamp;

#[derive(Debug, Parser)]
#[command(name = "copypatrol-backend", about = "copypatrol backend", version)]
pub struct Cli {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// store recent changes to be checked
    #[command(name = "store-changes")]
    StoreChanges {
        /// since the timestamp
        #[arg(long, value_parser = parse_timestamp, value_name = "YYYY-MM-DD HH:MM:SS")]
        since: Option<MwTimestamp>,
        /// maximum number to store
        #[arg(long, short = 'n', value_name = "N")]
        total: Option<u64>,
    },
    /// check stored changes
    #[command(name = "check-changes")]
    CheckChanges,
    /// check and generate reports
    Reports,
    /// database maintenance
    Db(DbArgs),
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct DbArgs {
    /// create the database tables
    #[arg(long)]
    pub create_tables: bool,
    /// remove revision from the database
    #[arg(long, value_name = "ID")]
    pub remove_revision: Option<u32>,
    /// remove submission from the database
    #[arg(long, value_name = "ID")]
    pub remove_submission: Option<Uuid>,
}

fn parse_timestamp(raw: &str) -> Result<MwTimestamp, String> {
    MwTimestamp::from_iso(raw).map_err(|parse_error| parse_error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("copypatrol-backend").chain(args.iter().copied()))
    }

    #[test]
    fn store_changes_arguments() {
        let cli = parse(&["store-changes"]).unwrap();
        let Action::StoreChanges { since, total } = cli.action else {
            panic!("wrong action")
        };
        assert_eq!(since, None);
        assert_eq!(total, None);

        let cli = parse(&["store-changes", "--since", "2022-01-01T00:00:00", "-n", "10"]).unwrap();
        let Action::StoreChanges { since, total } = cli.action else {
            panic!("wrong action")
        };
        assert_eq!(since, Some(MwTimestamp::from_mw("20220101000000").unwrap()));
        assert_eq!(total, Some(10));
    }

    #[test]
    fn plain_actions() {
        assert!(matches!(parse(&["check-changes"]).unwrap().action, Action::CheckChanges));
        assert!(matches!(parse(&["reports"]).unwrap().action, Action::Reports));
    }

    #[test]
    fn db_flags_are_mutually_exclusive() {
        let cli = parse(&["db", "--create-tables"]).unwrap();
        let Action::Db(db) = cli.action else { panic!("wrong action") };
        assert!(db.create_tables);

        let cli = parse(&["db", "--remove-revision", "123"]).unwrap();
        let Action::Db(db) = cli.action else { panic!("wrong action") };
        assert_eq!(db.remove_revision, Some(123));

        let cli = parse(&["db", "--remove-submission", "7b3074cf-4d3b-4648-8c68-f56aee0f1058"]).unwrap();
        let Action::Db(db) = cli.action else { panic!("wrong action") };
        assert_eq!(db.remove_submission,
                   Some(Uuid::parse_str("7b3074cf-4d3b-4648-8c68-f56aee0f1058").unwrap()));
    }

    #[test]
    fn invalid_invocations_fail() {
        for args in [&["foo"][..],
                     &["store-changes", "--foo", "bar"],
                     &["store-changes", "--since", "not-a-date"],
                     &["store-changes", "-n", "ten"],
                     &["check-changes", "foo"],
                     &["reports", "foo"],
                     &["db"],
                     &["db", "--create-tables", "--remove-revision", "1"],
                     &["db", "--remove-revision"],
                     &["db", "--remove-revision", "foo"],
                     &["db", "--remove-submission"],
                     &["db", "--remove-submission", "not-a-uuid"]] {
            assert!(parse(args).is_err(), "expected failure for {args:?}");
        }
    }
}
