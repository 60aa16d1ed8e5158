//! Build script for nftkit
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! shown by `nftkit --version`.

fn main() {
    println!("cargo:rerun-if-env-changed=NFTKIT_NFT_COMMAND");

    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
