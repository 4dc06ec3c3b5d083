use serde::Serialize;
use sibi_gateway::handshake::{MAX_CLIENT_VERSION, MIN_CLIENT_VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    min_client_version: i32,
    max_client_version: i32,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: "sibi",
        version: env!("CARGO_PKG_VERSION"),
        target: env!("SIBI_BUILD_TARGET"),
        min_client_version: MIN_CLIENT_VERSION,
        max_client_version: MAX_CLIENT_VERSION,
    };

    if format == OutputFormat::Json {
        print_json(&out);
        return Ok(SUCCESS);
    }

    if !args.extended {
        println!("{} {}", out.name, out.version);
        return Ok(SUCCESS);
    }

    println!("name: {}", out.name);
    println!("version: {}", out.version);
    println!("target: {}", out.target);
    println!(
        "api versions: {}..{}",
        out.min_client_version, out.max_client_version
    );
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );

    Ok(SUCCESS)
}
