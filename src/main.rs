use anyhow::{Context, Result};
use businessru::{BusinessruClient, ParamValue, Params, Scalar};
use clap::Parser;

/// businessru - signed business.ru API client
///
/// Performs one signed request and prints the response payload as JSON.
///
/// Examples:
///   businessru get goods -p limit=10
///   businessru post orders -p partner_id=5 -p goods=1 -p goods=2
#[derive(Parser, Debug)]
#[command(author, version = env!("BUSINESSRU_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Account subdomain (<ACCOUNT>.business.ru)
    #[arg(long, env = "BUSINESSRU_ACCOUNT", global = true)]
    account: Option<String>,

    /// Application id
    #[arg(long = "app-id", env = "BUSINESSRU_APP_ID", global = true)]
    app_id: Option<String>,

    /// Shared secret of the application
    #[arg(long, env = "BUSINESSRU_SECRET", hide_env_values = true, global = true)]
    secret: Option<String>,

    /// Attempts per request before a transient error is reported
    #[arg(
        long = "max-retry",
        env = "BUSINESSRU_MAX_RETRY",
        default_value_t = 10,
        global = true
    )]
    max_retry: usize,

    /// API base URL (defaults to https://<ACCOUNT>.business.ru/api/rest/)
    #[arg(long = "base-url", env = "BUSINESSRU_BASE_URL", value_name = "URL", global = true)]
    base_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a GET request
    Get(RequestArgs),

    /// Send a POST request
    Post(RequestArgs),

    /// Send a PUT request
    Put(RequestArgs),

    /// Obtain a fresh session token and exit
    Repair,
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Resource name, e.g. "goods" or "orders"
    #[arg(value_name = "RESOURCE")]
    resource: String,

    /// Request parameter; repeat a key to send a list
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Repeated keys become lists, in the order given.
fn collect_params(pairs: &[(String, String)]) -> Params {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.clone()),
            None => grouped.push((key.clone(), vec![value.clone()])),
        }
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                ParamValue::Scalar(Scalar::Str(values.remove(0)))
            } else {
                ParamValue::from(values)
            };
            (key, value)
        })
        .collect()
}

fn connect(cli: &Cli) -> Result<BusinessruClient> {
    let account = cli
        .account
        .clone()
        .context("--account (or BUSINESSRU_ACCOUNT) is required")?;
    let app_id = cli
        .app_id
        .clone()
        .context("--app-id (or BUSINESSRU_APP_ID) is required")?;
    let secret = cli
        .secret
        .clone()
        .context("--secret (or BUSINESSRU_SECRET) is required")?;

    let mut builder = BusinessruClient::builder(account, app_id, secret).max_retry(cli.max_retry);
    if let Some(base_url) = &cli.base_url {
        builder = builder.base_url(base_url.clone());
    }
    builder.build().context("Failed to connect to business.ru")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let client = connect(&cli)?;

    let (method, args) = match &cli.command {
        Commands::Get(args) => ("GET", args),
        Commands::Post(args) => ("POST", args),
        Commands::Put(args) => ("PUT", args),
        Commands::Repair => return Ok(()),
    };

    let payload = client
        .request(method, &args.resource, &collect_params(&args.params))
        .with_context(|| format!("{} {} failed", method, args.resource))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_get_parsing() {
        let cli = Cli::try_parse_from([
            "businessru",
            "--account",
            "shop",
            "get",
            "goods",
            "-p",
            "limit=10",
        ])
        .unwrap();
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.resource, "goods");
                assert_eq!(args.params, vec![("limit".to_string(), "10".to_string())]);
            }
            _ => panic!("Expected Get command"),
        }
        assert_eq!(cli.account.as_deref(), Some("shop"));
        assert_eq!(cli.max_retry, 10);
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "businessru",
            "put",
            "orders",
            "--max-retry",
            "3",
            "--base-url",
            "http://localhost:1234/",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Put(_)));
        assert_eq!(cli.max_retry, 3);
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:1234/"));
    }

    #[test]
    fn test_cli_repair_parsing() {
        let cli = Cli::try_parse_from(["businessru", "repair"]).unwrap();
        assert!(matches!(cli.command, Commands::Repair));
    }

    #[test]
    fn test_cli_rejects_malformed_param() {
        let result = Cli::try_parse_from(["businessru", "get", "goods", "-p", "novalue"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["businessru", "get", "goods", "-p", "=x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["businessru", "goods"]).is_err());
    }

    #[test]
    fn test_parse_param_keeps_equals_in_value() {
        assert_eq!(
            parse_param("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn test_collect_params_groups_repeated_keys() {
        let pairs = vec![
            ("ids".to_string(), "5".to_string()),
            ("name".to_string(), "x".to_string()),
            ("ids".to_string(), "7".to_string()),
        ];
        let params = collect_params(&pairs);
        assert_eq!(
            params.to_sorted_pairs(),
            vec![
                ("ids[0]".to_string(), "5".to_string()),
                ("ids[1]".to_string(), "7".to_string()),
                ("name".to_string(), "x".to_string()),
            ]
        );
    }
}
