// UI layer: the interactive upload menu, built on `dialoguer`. The
// functions are small and synchronous; remote work is delegated to
// `DriveClient` and per-file failures never abort the surrounding loop.
//
// dialoguer reports Ctrl-C / Esc during any prompt as an I/O error. Every
// prompt goes through `prompt_or_interrupt`, so an interrupt mid-flow
// winds the loop down the same way as one at the menu.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error};

use crate::drive::{DriveClient, UploadRequest, UploadSource};
use crate::error::Error;
use crate::picker::{self, EXTENDED_WAIT, FIRST_WAIT};

/// What a flow tells the menu loop to do next.
#[derive(PartialEq)]
enum Flow {
    Continue,
    Interrupted,
}

enum TimeoutChoice {
    Retry,
    Manual,
    Wait,
}

/// Unwrap a prompt result, collapsing an interrupt to `None`.
fn prompt_or_interrupt<T>(result: io::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("prompt ended: {}", e);
            None
        }
    }
}

/// Main interactive menu. Loops until the user exits; an interrupted
/// prompt, at the menu or inside a flow, ends the loop cleanly.
pub fn interactive_loop(client: &DriveClient) {
    // Probed once at startup; the menu simply omits the picker entry when
    // no dialog can be shown.
    let picker_enabled = picker::picker_available();
    if !picker_enabled {
        println!("No display detected; the GUI file picker is disabled.");
    }

    loop {
        println!();
        let items = if picker_enabled {
            vec![
                "Upload file(s) with the file picker",
                "Upload a file by path",
                "Exit",
            ]
        } else {
            vec!["Upload a file by path", "Exit"]
        };
        let selection =
            match prompt_or_interrupt(Select::new().items(&items).default(0).interact()) {
                Some(selection) => selection,
                None => {
                    println!("\nInterrupted. Exiting.");
                    return;
                }
            };
        let choice = if picker_enabled { selection } else { selection + 1 };
        let flow = match choice {
            0 => picker_upload(client),
            1 => manual_upload(client),
            _ => {
                println!("Goodbye!");
                return;
            }
        };
        if flow == Flow::Interrupted {
            println!("\nInterrupted. Exiting.");
            return;
        }
    }
}

/// Run the GUI picker with the bounded wait, then upload each selection.
fn picker_upload(client: &DriveClient) -> Flow {
    let pending = picker::open_picker();
    println!("Opening file picker... it may appear behind other windows.");

    let paths = match pending.wait(FIRST_WAIT) {
        Ok(paths) => paths,
        Err(Error::DialogTimeout(secs)) => {
            println!("File picker did not respond within {} seconds.", secs);
            match timeout_choice() {
                None => return Flow::Interrupted,
                Some(TimeoutChoice::Retry) => return Flow::Continue,
                Some(TimeoutChoice::Manual) => return manual_upload(client),
                Some(TimeoutChoice::Wait) => {
                    println!("Waiting {} more seconds...", EXTENDED_WAIT.as_secs());
                    match pending.wait(EXTENDED_WAIT) {
                        Ok(paths) => paths,
                        Err(e) => {
                            error!("file picker gave no result: {}", e);
                            println!("File picker still did not respond. Use manual entry.");
                            return Flow::Continue;
                        }
                    }
                }
            }
        }
        Err(e) => {
            error!("file dialog failed: {}", e);
            println!("File dialog error: {}. Use manual entry instead.", e);
            return Flow::Continue;
        }
    };

    if paths.is_empty() {
        println!("No file selected.");
        return Flow::Continue;
    }

    for path in paths {
        if !path.exists() {
            println!("File not found: {}", path.display());
            continue;
        }
        let name = match prompt_display_name(&path) {
            Some(name) => name,
            None => return Flow::Interrupted,
        };
        // In the multi-file flow an empty category skips just that file.
        let category = match prompt_or_interrupt::<String>(
            Input::new()
                .with_prompt("Category/subject (e.g. Maths, Science, English, History)")
                .allow_empty(true)
                .interact_text(),
        ) {
            Some(category) => category.trim().to_string(),
            None => return Flow::Interrupted,
        };
        if category.is_empty() {
            println!("Category is required. Skipping this file.");
            continue;
        }
        upload_path(client, path, name, category);
    }
    Flow::Continue
}

/// Prompt for a path, display name and category, then upload.
fn manual_upload(client: &DriveClient) -> Flow {
    let path = match prompt_or_interrupt::<String>(
        Input::new().with_prompt("File path").interact_text(),
    ) {
        Some(path) => PathBuf::from(path.trim()),
        None => return Flow::Interrupted,
    };
    if !path.exists() {
        println!("File not found: {}", path.display());
        return Flow::Continue;
    }
    let name = match prompt_display_name(&path) {
        Some(name) => name,
        None => return Flow::Interrupted,
    };
    let category = match prompt_or_interrupt::<String>(
        Input::new()
            .with_prompt("Category/subject (e.g. Maths, Science, English, History)")
            .validate_with(|input: &String| validate_category(input))
            .interact_text(),
    ) {
        Some(category) => category.trim().to_string(),
        None => return Flow::Interrupted,
    };
    upload_path(client, path, name, category);
    Flow::Continue
}

/// Ask for a display name, keeping the file's own name on empty input.
/// `None` means the prompt was interrupted.
fn prompt_display_name(path: &PathBuf) -> Option<String> {
    let original = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let name = prompt_or_interrupt::<String>(
        Input::new()
            .with_prompt(format!("File name (empty keeps '{}')", original))
            .allow_empty(true)
            .interact_text(),
    )?;
    let name = name.trim();
    Some(if name.is_empty() {
        original
    } else {
        name.to_string()
    })
}

fn timeout_choice() -> Option<TimeoutChoice> {
    let items = [
        "Retry with a new picker",
        "Enter a path manually",
        "Keep waiting (60 more seconds)",
    ];
    let selection = prompt_or_interrupt(Select::new().items(&items).default(0).interact())?;
    Some(match selection {
        0 => TimeoutChoice::Retry,
        1 => TimeoutChoice::Manual,
        _ => TimeoutChoice::Wait,
    })
}

/// Validator for the manual flow: an empty category re-prompts instead of
/// proceeding.
fn validate_category(input: &str) -> std::result::Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Category is required")
    } else {
        Ok(())
    }
}

/// Upload one local file, reporting success or failure without aborting
/// the surrounding loop.
fn upload_path(client: &DriveClient, path: PathBuf, name: String, category: String) {
    let request = UploadRequest {
        source: UploadSource::Path(path),
        name,
        category,
        content_type: None,
    };
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message("Uploading...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    match client.upload(&request) {
        Ok(result) => {
            spinner.finish_and_clear();
            println!("Uploaded '{}' (id {})", result.name, result.id);
            if let Some(link) = result.web_view_link {
                println!("Link: {}", link);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("upload failed: {}", e);
            println!("Upload failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_blank_categories_are_rejected() {
        assert!(validate_category("").is_err());
        assert!(validate_category("   ").is_err());
    }

    #[test]
    fn real_categories_pass_validation() {
        assert!(validate_category("Maths").is_ok());
        assert!(validate_category(" History ").is_ok());
    }

    #[test]
    fn an_interrupted_prompt_collapses_to_none() {
        let interrupted: io::Result<String> =
            Err(io::Error::new(io::ErrorKind::Interrupted, "ctrl-c"));
        assert!(prompt_or_interrupt(interrupted).is_none());
        assert_eq!(
            prompt_or_interrupt(Ok("Maths".to_string())).as_deref(),
            Some("Maths")
        );
    }
}
