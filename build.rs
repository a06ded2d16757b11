// build.rs

use std::env;

fn main() -> anyhow::Result<()> {
    // no repository when building from a crates.io tarball
    if let Ok(commit) = build_data::get_git_commit() {
        println!("cargo:rustc-env=GIT_COMMIT={commit}");
    }
    build_data::set_BUILD_TIMESTAMP();
    build_data::no_debug_rebuilds();

    let mqtt_url = env::var("MQTT_URL").unwrap_or_else(|_| "mqtt://mqtt.eclipseprojects.io:1883".into());
    let api_port = env::var("API_PORT").unwrap_or_else(|_| "8080".into());

    println!("cargo:rustc-env=MQTT_URL={mqtt_url}");
    println!("cargo:rustc-env=API_PORT={api_port}");
    println!("cargo:rerun-if-env-changed=MQTT_URL");
    println!("cargo:rerun-if-env-changed=API_PORT");

    Ok(())
}

// EOF
