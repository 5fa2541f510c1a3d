use anyhow::Result;
use bdaysync_core::Settings;
use bdaysync_core::scheduler::Jobs;

use crate::app::DavJobs;

pub async fn run(settings: &Settings) -> Result<()> {
    let report = DavJobs::new(settings.clone()).diagnose().await?;

    println!("Address books:");
    if report.address_books.is_empty() {
        println!("   (none listed)");
    }
    for book in &report.address_books {
        println!("   {book}");
    }

    println!();
    println!("Birthdays:");
    for contact in &report.contacts {
        println!(
            "   {} {} [{}]",
            contact.birthday,
            contact.name,
            contact.address_book.as_deref().unwrap_or("-")
        );
    }

    println!();
    println!("{report}");
    Ok(())
}
