use console::{style, Term};
use dialoguer::{Confirm, Input, Select};
use std::io::IsTerminal;
use std::path::Path;

/// One host section collected by the wizard
#[derive(Debug, Clone)]
pub struct WizardHost {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub commands: Vec<String>,
}

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Run the interactive configuration wizard
/// Returns the generated config content as a string, or an error
pub fn run_config_wizard(config_path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let term = Term::stdout();

    term.write_line("")?;
    term.write_line(&format!(
        "{}",
        style("╭─────────────────────────────────────────╮").cyan()
    ))?;
    term.write_line(&format!(
        "{}",
        style("│    ScriptDeck Configuration Wizard      │").cyan()
    ))?;
    term.write_line(&format!(
        "{}",
        style("╰─────────────────────────────────────────╯").cyan()
    ))?;
    term.write_line("")?;

    // Step 1: Host selection
    term.write_line(&format!("{}", style("Step 1/3: Listen Address").bold()))?;
    term.write_line("Which network interface should the control panel listen on?")?;
    term.write_line("")?;

    let listen_host = select_host(&term)?;

    term.write_line("")?;

    // Step 2: Remote hosts
    term.write_line(&format!("{}", style("Step 2/3: Remote Hosts").bold()))?;
    term.write_line("Add the machines running the process supervisor.")?;
    term.write_line("")?;

    let mut hosts = Vec::new();
    loop {
        hosts.push(prompt_host(&term, hosts.len() + 1)?);

        let more = Confirm::new()
            .with_prompt("Add another host?")
            .default(false)
            .interact()?;
        if !more {
            break;
        }
        term.write_line("")?;
    }

    term.write_line("")?;

    // Step 3: Poll interval
    term.write_line(&format!("{}", style("Step 3/3: Status Polling").bold()))?;
    term.write_line("How often should each script's status be refreshed?")?;
    term.write_line("")?;

    let poll_interval: u64 = Input::new()
        .with_prompt("Poll interval in seconds")
        .default(5)
        .validate_with(|v: &u64| {
            if *v > 0 {
                Ok(())
            } else {
                Err("must be a positive integer")
            }
        })
        .interact_text()?;

    term.write_line("")?;

    let config_content = generate_config(&listen_host, &hosts, poll_interval);

    // Show summary
    term.write_line(&format!("{}", style("Configuration Summary").bold().green()))?;
    term.write_line(&format!("  Listen address: {}", style(&listen_host).cyan()))?;
    for host in &hosts {
        term.write_line(&format!(
            "  {} ({}:{}): {} script(s)",
            style(&host.name).cyan(),
            host.address,
            host.port,
            host.commands.len()
        ))?;
    }
    term.write_line(&format!(
        "  Poll interval: {}",
        style(format!("{}s", poll_interval)).cyan()
    ))?;
    term.write_line(&format!(
        "  Config file: {}",
        style(config_path.display()).cyan()
    ))?;
    term.write_line("")?;

    Ok(config_content)
}

/// Interactive host selection with 0.0.0.0 warning
fn select_host(term: &Term) -> Result<String, Box<dyn std::error::Error>> {
    loop {
        let options = vec![
            "127.0.0.1 (localhost only - recommended for security)",
            "0.0.0.0 (all interfaces - accessible from network)",
        ];

        let selection = Select::new()
            .with_prompt("Select listen address")
            .items(&options)
            .default(0)
            .interact()?;

        if selection == 0 {
            return Ok("127.0.0.1".to_string());
        }

        // User selected 0.0.0.0 - show warning and ask for confirmation
        term.write_line("")?;
        term.write_line(&format!(
            "{}",
            style("⚠️  Security Warning").yellow().bold()
        ))?;
        term.write_line(&format!(
            "{}",
            style("Anyone who can reach the panel can start and stop your scripts.").yellow()
        ))?;
        term.write_line(&format!(
            "{}",
            style("Consider setting server.allowed_clients afterwards.").yellow()
        ))?;
        term.write_line("")?;

        let confirmed = Confirm::new()
            .with_prompt("Are you sure you want to listen on all interfaces?")
            .default(false)
            .interact()?;

        if confirmed {
            return Ok("0.0.0.0".to_string());
        }

        term.write_line("")?;
        term.write_line("Returning to host selection...")?;
        term.write_line("")?;
    }
}

/// Ask for one host and the scripts it runs
fn prompt_host(term: &Term, index: usize) -> Result<WizardHost, Box<dyn std::error::Error>> {
    let name: String = Input::new()
        .with_prompt("Host name")
        .default(format!("Pi {}", index))
        .interact_text()?;

    let address: String = Input::new()
        .with_prompt("Host address")
        .validate_with(|v: &String| {
            if v.trim().is_empty() {
                Err("address is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Supervisor port")
        .default(5005)
        .interact_text()?;

    term.write_line(&format!(
        "{}",
        style("Enter the command line of each script. Leave empty to finish.").dim()
    ))?;

    let mut commands = Vec::new();
    loop {
        let command: String = Input::new()
            .with_prompt(format!("Script #{}", commands.len() + 1))
            .allow_empty(true)
            .interact_text()?;

        if command.trim().is_empty() {
            break;
        }
        commands.push(command);
    }

    if commands.is_empty() {
        term.write_line(&format!(
            "{}",
            style("No scripts added; the host will show up empty.").yellow()
        ))?;
    }

    Ok(WizardHost {
        name: name.trim().to_string(),
        address: address.trim().to_string(),
        port,
        commands,
    })
}

/// Render a TOML basic string. JSON string escapes are a subset of TOML's.
fn toml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Generate the config file content
pub(crate) fn generate_config(listen_host: &str, hosts: &[WizardHost], poll_interval: u64) -> String {
    let mut content = format!(
        r#"[server]
host = {host}
port = 8080
# Only these client IPs may use the panel (empty: anyone who can connect)
allowed_clients = []

[logging]
level = "info"
file = "scriptdeck.log"
"#,
        host = toml_string(listen_host)
    );

    for host in hosts {
        content.push_str(&format!(
            "\n[[hosts]]\nname = {}\naddress = {}\nport = {}\n",
            toml_string(&host.name),
            toml_string(&host.address),
            host.port
        ));

        for command in &host.commands {
            content.push_str(&format!(
                "\n[[hosts.scripts]]\ncommand = {}\npoll_interval = {}\n",
                toml_string(command),
                poll_interval
            ));
        }
    }

    content
}

/// Ask user if they want to generate a default config (for interactive mode when config is missing)
pub fn prompt_create_config(config_path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let term = Term::stdout();

    term.write_line("")?;
    term.write_line(&format!(
        "{}",
        style(format!(
            "Config file '{}' not found.",
            config_path.display()
        ))
        .yellow()
    ))?;
    term.write_line("")?;

    let create = Confirm::new()
        .with_prompt("Would you like to create a configuration file?")
        .default(true)
        .interact()?;

    Ok(create)
}

/// Write the config content to a file
pub fn write_config_file(
    config_path: &Path,
    content: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    // Ensure parent directory exists
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(config_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_toml;

    #[test]
    fn test_generated_config_loads_back() {
        let hosts = vec![
            WizardHost {
                name: "Pi 1".to_string(),
                address: "192.168.0.211".to_string(),
                port: 5005,
                commands: vec![
                    "python /home/pi/camStreamer.py --ip 192.168.0.225 --port 5000".to_string(),
                    r#"sh -c "echo \"hi\" > C:\tmp\log""#.to_string(),
                ],
            },
            WizardHost {
                name: "Pi 2".to_string(),
                address: "192.168.0.19".to_string(),
                port: 6000,
                commands: vec![],
            },
        ];

        let content = generate_config("127.0.0.1", &hosts, 3);
        let config = parse_toml(&content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.file.as_deref(), Some("scriptdeck.log"));
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.hosts[0].scripts.len(), 2);
        assert_eq!(config.hosts[0].scripts[1].command, hosts[0].commands[1]);
        assert_eq!(config.hosts[0].scripts[0].poll_interval, 3);
        assert_eq!(config.hosts[1].port, 6000);
        assert!(config.hosts[1].scripts.is_empty());
    }
}
