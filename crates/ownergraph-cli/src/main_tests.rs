//! CLI tests

use super::*;

#[test]
fn test_parse_holding_with_percentage() {
    let holding = parse_holding("5560160680=Ericsson@22.5").unwrap();
    assert_eq!(holding.entity_id, "556016-0680");
    assert_eq!(holding.name, "Ericsson");
    assert_eq!(holding.ownership_pct, Some(22.5));
}

#[test]
fn test_parse_holding_without_percentage() {
    let holding = parse_holding("556014-2720=Atlas Copco AB").unwrap();
    assert_eq!(holding.name, "Atlas Copco AB");
    assert_eq!(holding.ownership_pct, None);
}

#[test]
fn test_parse_holding_percent_sign() {
    let holding = parse_holding("556014-2720=Atlas Copco@16.9%").unwrap();
    assert_eq!(holding.ownership_pct, Some(16.9));
}

#[test]
fn test_parse_holding_rejects_bad_input() {
    assert!(parse_holding("Ericsson").is_err());
    assert!(parse_holding("12345=Short").is_err());
    assert!(parse_holding("556016-0680=").is_err());
    assert!(parse_holding("556016-0680=Ericsson@lots").is_err());
}

#[test]
fn test_parse_batch_skips_comments_and_blanks() {
    let requests = parse_batch(
        "# roots\n556043-4200,Investor AB\n\n502032-9081, \"Skandinaviska Enskilda Banken\"\n",
    )
    .unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].entity_id, "556043-4200");
    assert_eq!(requests[1].name, "Skandinaviska Enskilda Banken");
}

#[test]
fn test_parse_batch_reports_line_numbers() {
    let err = parse_batch("556043-4200,Investor AB\nno comma here\n").unwrap_err();
    assert!(err.to_string().contains("line 2"));

    let err = parse_batch("556043-4200,\n").unwrap_err();
    assert!(err.to_string().contains("missing name"));
}

#[test]
fn test_cli_parses_ingest_with_holdings() {
    let cli = Cli::try_parse_from([
        "ownergraph",
        "--format",
        "json",
        "ingest",
        "556043-4200",
        "Investor AB",
        "--holding",
        "556016-0680=Ericsson@22.5",
        "--holding",
        "556014-2720=Atlas Copco",
    ])
    .unwrap();

    assert_eq!(cli.format, OutputFormat::Json);
    match cli.command {
        Commands::Ingest { id, name, holdings } => {
            assert_eq!(id, "556043-4200");
            assert_eq!(name, "Investor AB");
            assert_eq!(holdings.len(), 2);
        }
        _ => panic!("expected ingest"),
    }
}

#[test]
fn test_cli_network_default_depth() {
    let cli = Cli::try_parse_from(["ownergraph", "network", "556043-4200"]).unwrap();
    assert!(matches!(cli.command, Commands::Network { depth: 2, .. }));
}

#[test]
fn test_cli_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["ownergraph", "stats", "--db", "/tmp/graph.db", "-q"]).unwrap();
    assert!(cli.quiet);
    assert_eq!(cli.db, Some(PathBuf::from("/tmp/graph.db")));
}

#[test]
fn test_cli_rejects_bad_holding() {
    assert!(
        Cli::try_parse_from(["ownergraph", "ingest", "556043-4200", "Investor", "--holding", "x"])
            .is_err()
    );
}
