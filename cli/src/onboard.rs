use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use sgr_core::config::Config;

const BANNER: &str = r"
    -------------------------------------
      sgr  ::  schema-guided reasoning
    -------------------------------------
";

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_provider() -> Result<&'static str> {
    let providers = ["openai", "ollama"];

    let selection = Select::new()
        .with_prompt("Select your provider")
        .items(&providers)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(providers[selection])
}

fn setup_api_key() -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt("Enter your OpenAI API key (leave empty to use OPENAI_API_KEY)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")?;

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: &str) -> Result<String> {
    let models: &[&str] = match provider {
        "ollama" => &["llama3.2", "qwen2.5", "mistral"],
        _ => &["gpt-4o", "gpt-4o-mini", "gpt-5", "gpt-5-mini"],
    };

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

fn setup_base_url(provider: &str) -> Result<Option<String>> {
    let default = match provider {
        "ollama" => "http://localhost:11434",
        _ => "https://api.openai.com/v1",
    };

    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(default.to_string())
        .interact_text()
        .context("Failed to read base URL")?;

    let base_url = base_url.trim().to_string();
    Ok((base_url != default).then_some(base_url))
}

pub fn run_init() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());
    println!(
        "  {}",
        style("This wizard writes the config used by `sgr run`.").dim()
    );

    print_step(1, 3, "Provider");
    let provider = setup_provider()?;

    print_step(2, 3, "Credentials");
    let api_key = if provider == "openai" {
        setup_api_key()?
    } else {
        String::new()
    };
    let base_url = setup_base_url(provider)?;

    print_step(3, 3, "Model Selection");
    let model = setup_model(provider)?;

    let config = Config {
        provider: Some(provider.to_string()),
        api_key,
        base_url,
        model,
        ..Default::default()
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());

    Ok(config)
}

/// Printed once the config from [`run_init`] has been written.
pub fn print_saved(config: &Config) {
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(sgr_core::config::get_config_path().display()).cyan()
    );
    println!(
        "  {} Results will be written to {}",
        style("→").green(),
        style(config.results_dir.display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("sgr run --tasks tasks.json").cyan().bold()
    );
    println!();
}
