use pomobot_core::StageList;

/// Validate a setup string and print the parsed stages.
pub fn run(setup: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stages = StageList::parse(setup)?;
    println!("{}", serde_json::to_string_pretty(&stages)?);
    eprintln!(
        "{} stage(s), {} min per cycle: {}",
        stages.len(),
        stages.cycle_duration().num_minutes(),
        stages
    );
    Ok(())
}
