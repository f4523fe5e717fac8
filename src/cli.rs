use crate::config::Config;
use crate::fetch;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "ezfetch",
    about = "Fetch a PDF from a publisher site through the university ez-proxy",
    version
)]
pub struct Args {
    /// The URL to download a pdf from.
    pub url: String,

    /// Download the pdf to this directory.
    #[arg(long)]
    pub pdf_download_dir: Option<PathBuf>,

    /// Proxy rewrite template, e.g. "http://{netloc}.lib.university.edu:2048{path}".
    #[arg(long)]
    pub proxy_url_fmt: Option<String>,

    /// Open the pdf after download.
    #[arg(long, overrides_with = "no_open_pdf")]
    pub open_pdf: bool,

    /// Do not open the pdf after download.
    #[arg(long, overrides_with = "open_pdf")]
    pub no_open_pdf: bool,

    /// Snatch session cookies from this browser (chrome, chromium, edge, brave).
    #[arg(long)]
    pub cookies_snatch_from: Option<String>,

    /// Cookie names to snatch; all cookies for the domain when omitted.
    #[arg(long, num_args = 1.., value_name = "KEY")]
    pub cookie_snatch_keys: Vec<String>,

    /// Domain to extract browser cookies for.
    #[arg(long)]
    pub cookie_snatch_domain: Option<String>,

    /// Load this config file instead of the default location.
    #[arg(long)]
    pub configfile: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Testing mode; implies debug logging.
    #[arg(long)]
    pub testing: bool,
}

impl Args {
    /// CLI values win over file config.
    fn overlay(&self, config: &mut Config) {
        if let Some(dir) = &self.pdf_download_dir {
            config.pdf_download_dir = Some(dir.clone());
        }
        if let Some(fmt) = &self.proxy_url_fmt {
            config.proxy_url_fmt = Some(fmt.clone());
        }
        if let Some(open) = self.open_override() {
            config.pdf_open_after_download = open;
        }
        if let Some(browser) = &self.cookies_snatch_from {
            config.cookies_snatch_from = Some(browser.clone());
        }
        if !self.cookie_snatch_keys.is_empty() {
            config.cookie_snatch_keys = self.cookie_snatch_keys.clone();
        }
        if let Some(domain) = &self.cookie_snatch_domain {
            config.cookie_snatch_domain = Some(domain.clone());
        }
    }

    fn open_override(&self) -> Option<bool> {
        if self.open_pdf {
            Some(true)
        } else if self.no_open_pdf {
            Some(false)
        } else {
            None
        }
    }
}

pub async fn run(args: Args) -> ExitCode {
    init_logging(args.loglevel.as_deref(), args.testing);

    let mut config = match Config::load(args.configfile.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.overlay(&mut config);

    match fetch::fetch_pdf(&args.url, &config).await {
        Ok(Some(path)) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("No PDF found for {}", args.url);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("failed to fetch pdf from {}: {e}", args.url);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(loglevel: Option<&str>, testing: bool) {
    let level = match loglevel {
        Some(value) => value.parse().unwrap_or_else(|_| {
            eprintln!("unknown log level '{value}', using info");
            LevelFilter::Info
        }),
        None if testing => LevelFilter::Debug,
        None => LevelFilter::Info,
    };
    env_logger::Builder::new().filter_level(level).init();
}
