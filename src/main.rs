// Entrypoint for the CLI application.
// - Keeps `main` small: authenticate once, build the organizer client and
//   hand it to the chosen mode.
// - Returns `anyhow::Result` so only authentication failures abort with a
//   message; everything else is handled inside the flows.

use anyhow::Context;
use dialoguer::Select;

use drivesort::{auth, config::Config, demo, drive::DriveClient, ui};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Google Drive File Organizer");
    println!("Requires a client secret file (credentials.json) from the Google Cloud Console.\n");

    let config = Config::from_env();
    let session = auth::obtain_session(&config).context("authentication failed")?;
    let client = DriveClient::new(&config, &session)?;
    println!("Authenticated with Google Drive.\n");

    let items = [
        "Demo: upload four sample files",
        "Interactive upload",
        "Exit",
    ];
    match Select::new().items(&items).default(0).interact()? {
        0 => {
            demo::run(&client);
        }
        1 => ui::interactive_loop(&client),
        _ => {}
    }
    Ok(())
}
