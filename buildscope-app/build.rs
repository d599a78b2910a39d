use shadow_rs::{BuildPattern, ShadowBuilder};

// Build metadata behind the `x-version-id` header, regenerated on every build.
fn main() -> shadow_rs::SdResult<()> {
    ShadowBuilder::builder()
        .build_pattern(BuildPattern::RealTime)
        .build()?;
    Ok(())
}
