use kpmatch::{NoDisplay, Settings, SystemViewer};
use log::*;
use std::error::Error as _;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "kpmatch",
    about = "Finds the gallery image that best matches a query image"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `kpmatch::Settings`. If it doesn't exist, the
    /// defaults are used.
    #[structopt(short, long, default_value = "kpmatch-settings.json", parse(from_os_str))]
    settings: PathBuf,
    /// The query image, overriding the settings file.
    #[structopt(long, parse(from_os_str))]
    query: Option<PathBuf>,
    /// The manifest listing the train images, one per line.
    ///
    /// Names are relative to the directory of the manifest.
    #[structopt(long, parse(from_os_str))]
    manifest: Option<PathBuf>,
    /// The existing directory to write the `res_*` images to.
    #[structopt(long, parse(from_os_str))]
    results: Option<PathBuf>,
    /// The keypoint detector (AKAZE or FAST).
    #[structopt(long)]
    detector: Option<String>,
    /// The descriptor extractor (AKAZE or BRIEF).
    #[structopt(long)]
    extractor: Option<String>,
    /// The descriptor matcher (BruteForce-Hamming or FlannBased).
    #[structopt(long)]
    matcher: Option<String>,
    /// Don't open the best match in the image viewer.
    #[structopt(long)]
    no_display: bool,
}

impl Opt {
    fn apply(self, settings: &mut Settings) {
        if let Some(query) = self.query {
            settings.query_image = query;
        }
        if let Some(manifest) = self.manifest {
            settings.train_manifest = manifest;
        }
        if let Some(results) = self.results {
            settings.results_dir = results;
        }
        if let Some(detector) = self.detector {
            settings.detector = detector;
        }
        if let Some(extractor) = self.extractor {
            settings.extractor = extractor;
        }
        if let Some(matcher) = self.matcher {
            settings.matcher = matcher;
        }
        if self.no_display {
            settings.display = false;
        }
    }
}

fn run(opt: Opt) -> kpmatch::Result<()> {
    let mut settings = Settings::load(&opt.settings)?;
    opt.apply(&mut settings);
    debug!("settings: {:?}", settings);

    let report = if settings.display {
        kpmatch::run(&settings, &mut SystemViewer::new(settings.display_seconds))?
    } else {
        kpmatch::run(&settings, &mut NoDisplay)?
    };
    info!(
        "best match {} with {} of {} matches, {} result images saved",
        report.best_name,
        report.tallies[report.best_index],
        report.match_count,
        report.saved.len()
    );
    Ok(())
}

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    if let Err(e) = run(opt) {
        error!("{}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            error!("caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(e.exit_code());
    }
}
