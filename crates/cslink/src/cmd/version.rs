use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("cslink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: cslink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CSLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: peer={}, ddc={}, async={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "ddc"),
        cfg!(feature = "async")
    );
    println!(
        "monitor: {}",
        if cfg!(target_os = "linux") {
            "i2c-dev"
        } else {
            "unavailable"
        }
    );

    Ok(SUCCESS)
}
