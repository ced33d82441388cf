use wirepair_frame::{WireFormat, DEFAULT_MAX_PAYLOAD, JSON_CODEC_VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wirepair {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wirepair");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("WIREPAIR_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("WIREPAIR_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "wire_formats: tagged (default, {}-byte header), signed-length ({}-byte header)",
        WireFormat::Tagged.header_size(),
        WireFormat::SignedLength.header_size()
    );
    println!("json_codec_version: {JSON_CODEC_VERSION}");
    println!("default_max_payload: {DEFAULT_MAX_PAYLOAD}");

    Ok(SUCCESS)
}
