// Scripted demo: uploads four fixed in-memory samples into two category
// folders. Individual failures are reported and the batch moves on.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::error;

use crate::drive::{DriveClient, UploadRequest, UploadSource};

/// Fixed sample records used by the demo batch.
pub struct Sample {
    pub content: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

pub const SAMPLES: [Sample; 4] = [
    Sample {
        content: "This is a sample Mathematics paper about algebra and calculus.",
        name: "Algebra_Notes.txt",
        category: "Maths",
    },
    Sample {
        content: "Physics notes on Newton's laws and motion.",
        name: "Physics_Chapter1.txt",
        category: "Science",
    },
    Sample {
        content: "Chemistry periodic table and chemical reactions.",
        name: "Chemistry_Basics.txt",
        category: "Science",
    },
    Sample {
        content: "Advanced calculus and differential equations.",
        name: "Calculus_Advanced.txt",
        category: "Maths",
    },
];

/// Upload every sample in order and report what landed. Returns the
/// number of successful uploads.
pub fn run(client: &DriveClient) -> usize {
    println!("\nUploading {} sample files...", SAMPLES.len());
    let mut uploaded = 0;
    for (index, sample) in SAMPLES.iter().enumerate() {
        println!(
            "\n[{}/{}] Uploading: {}",
            index + 1,
            SAMPLES.len(),
            sample.name
        );
        let request = UploadRequest {
            source: UploadSource::Bytes(sample.content.as_bytes().to_vec()),
            name: sample.name.to_string(),
            category: sample.category.to_string(),
            content_type: Some("text/plain".to_string()),
        };

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        spinner.set_message("Uploading...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        match client.upload(&request) {
            Ok(result) => {
                spinner.finish_and_clear();
                println!("  Name: {}", result.name);
                println!("  Category: {}", sample.category);
                if let Some(link) = result.web_view_link {
                    println!("  Link: {}", link);
                }
                uploaded += 1;
            }
            Err(e) => {
                spinner.finish_and_clear();
                error!("upload of {} failed: {}", sample.name, e);
                println!("Upload failed: {}", e);
            }
        }
    }
    println!("\nDone: {}/{} files uploaded.", uploaded, SAMPLES.len());
    uploaded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_demo_covers_two_categories_with_two_files_each() {
        let maths = SAMPLES.iter().filter(|s| s.category == "Maths").count();
        let science = SAMPLES.iter().filter(|s| s.category == "Science").count();
        assert_eq!(maths, 2);
        assert_eq!(science, 2);
    }
}
