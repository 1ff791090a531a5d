use anyhow::Result;
use colored::Colorize;
use pour::cellar;
use pour::config::Config;

/// Show resolved configuration and installed kegs
pub fn config(config: &Config) -> Result<()> {
    println!("{}", "==> Configuration".bold().green());
    println!();

    println!("{}", "Paths:".bold());
    println!(
        "  {}: {}",
        "Prefix".dimmed(),
        config.prefix.display().to_string().cyan()
    );
    println!(
        "  {}: {}",
        "Cellar".dimmed(),
        config.cellar().display().to_string().cyan()
    );
    println!(
        "  {}: {}",
        "Cache".dimmed(),
        config.cache_dir().display().to_string().cyan()
    );
    println!();

    let kegs = cellar::list_kegs(&config.cellar())?;
    println!("{} {}", "Installed kegs:".bold(), kegs.len().to_string().cyan());
    for keg in &kegs {
        let status = if keg.is_complete() {
            String::new()
        } else {
            format!(" {}", "(incomplete)".yellow())
        };
        println!("  {} {}{}", keg.name.bold(), keg.version, status);
    }
    println!();

    println!("{}", "System:".bold());
    println!(
        "  {}: {}",
        "Version".dimmed(),
        env!("CARGO_PKG_VERSION").cyan()
    );
    println!(
        "  {}: {}",
        "Architecture".dimmed(),
        std::env::consts::ARCH.cyan()
    );
    println!("  {}: {}", "OS".dimmed(), std::env::consts::OS.cyan());

    Ok(())
}
