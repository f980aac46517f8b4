use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "pipeline_lambda";

/// Every Lambda binary of the pipeline, one per deployed function.
const LAMBDA_BINARIES: [&str; 6] = [
    "http_call_lambda",
    "dit_trade_barriers_lambda",
    "ea_floods_lambda",
    "ea_flood_areas_lambda",
    "nhs_uec_sitrep_lambda",
    "init_warehouse_lambda",
];

/// Name the handlers look for under `LAMBDA_TASK_ROOT`.
const CA_BUNDLE_ENTRY: &str = "global-bundle.pem";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the dataset pipeline workspace",
    long_about = "A unified CLI for CI checks, warehouse integration tests and\n\
                  Lambda packaging in the dataset pipeline workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run the ignored warehouse round-trip tests against a live database
    IntegrationTest {
        /// Connection URL of a disposable PostgreSQL database
        #[arg(long, env = "PIPELINE_TEST_DATABASE_URL")]
        database_url: String,
    },
    /// Build and package every Lambda binary as a `bootstrap` zip
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory receiving `<bin>.zip` artifacts
        #[arg(long, default_value = "dist")]
        output_dir: PathBuf,
        /// RDS certificate bundle to ship next to `bootstrap`
        #[arg(long)]
        ca_bundle: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and unit tests
    Check,
    /// Warehouse round-trip tests (needs PIPELINE_TEST_DATABASE_URL)
    Integration,
    /// Run check + integration
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str], envs: &[(&str, &str)]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .envs(envs.iter().copied())
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    run_cargo_with_env(args, &[]);
}

fn run_cargo_with_env(args: &[&str], envs: &[(&str, &str)]) {
    let status = cargo(args, envs);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_serverless_lambdas(
    target: &str,
    profile: BuildProfile,
    output_dir: &Path,
    ca_bundle: Option<&Path>,
) {
    ensure_rust_target_installed(target);

    step("Build pipeline lambda binaries");

    let mut cargo_args = vec!["build", "-p", LAMBDA_PACKAGE, "--target", target];
    for bin in LAMBDA_BINARIES {
        cargo_args.extend(["--bin", bin]);
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    fs::create_dir_all(output_dir).expect("failed to create lambda dist directory");

    let ca_bundle = ca_bundle.map(|path| {
        fs::read(path)
            .unwrap_or_else(|error| panic!("failed to read CA bundle '{}': {error}", path.display()))
    });

    let mut packaged = Vec::with_capacity(LAMBDA_BINARIES.len());
    for bin in LAMBDA_BINARIES {
        let zip_path = output_dir.join(format!("{bin}.zip"));
        package_lambda_zip(
            &target_dir.join(binary_name(bin, target)),
            &zip_path,
            ca_bundle.as_deref(),
        );
        packaged.push(zip_path);
    }

    eprintln!("\nPackaged artifacts:");
    for path in packaged {
        eprintln!("- {}", path.display());
    }
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- serverless-package`"
        );
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path, ca_bundle: Option<&[u8]>) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("bootstrap", options.unix_permissions(0o755))
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");

    if let Some(bundle) = ca_bundle {
        zip.start_file(CA_BUNDLE_ENTRY, options.unix_permissions(0o644))
            .expect("failed to start CA bundle entry in lambda zip");
        zip.write_all(bundle)
            .expect("failed to write CA bundle entry");
    }
    zip.finish().expect("failed to finish lambda zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test pipeline_core");
    run_cargo(&["test", "-p", "pipeline_core"]);

    step("Test pipeline_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_integration(database_url: &str) {
    step("Warehouse round-trip tests");
    run_cargo_with_env(
        &[
            "test",
            "-p",
            LAMBDA_PACKAGE,
            "--test",
            "warehouse_roundtrip_tests",
            "--",
            "--ignored",
        ],
        &[("PIPELINE_TEST_DATABASE_URL", database_url)],
    );
}

fn integration_database_url() -> String {
    std::env::var("PIPELINE_TEST_DATABASE_URL").unwrap_or_else(|_| {
        eprintln!("PIPELINE_TEST_DATABASE_URL must be set for the integration job");
        exit(2);
    })
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Integration => ci_integration(&integration_database_url()),
                CiJob::All => {
                    ci_check();
                    ci_integration(&integration_database_url());
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::IntegrationTest { database_url } => {
            ci_integration(&database_url);
        }
        Commands::ServerlessPackage {
            target,
            profile,
            output_dir,
            ca_bundle,
        } => {
            package_serverless_lambdas(&target, profile, &output_dir, ca_bundle.as_deref());
        }
    }
}
