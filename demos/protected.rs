//! Protected Demo - an RC4-encrypted document with restricted permissions
//!
//! The document opens without a password but only allows printing and
//! copying. The owner password is generated when none is given.
//!
//! Run with: cargo run --example protected -p folio-pdf

use folio_pdf::{Align, Border, Document, DocumentConfig, NextPosition, Permissions};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    std::fs::create_dir_all("output")?;

    let config = DocumentConfig::from_json(r#"{"unit": "pt", "page_size": "letter"}"#)?;
    let mut doc = Document::new(config)?;
    doc.set_protection(Permissions::PRINT | Permissions::COPY, "", None)?;
    doc.set_subject("Restricted handout");

    doc.add_page()?;
    doc.set_font("Courier", "B", 18.0)?;
    doc.cell(0.0, 30.0, "Confidential", Border::ALL, NextPosition::NextLine, Align::Center, false)?;
    doc.ln(Some(12.0));
    doc.set_font("Courier", "", 11.0)?;
    doc.multi_cell(
        0.0,
        14.0,
        "This document can be printed and its text copied, but not modified. \
         Every string and stream is encrypted with a key derived from the object number.",
        Border::empty(),
        Align::Left,
        false,
    )?;

    let bytes = doc.output()?;
    std::fs::write("output/protected.pdf", &bytes)?;
    println!("Wrote output/protected.pdf ({} bytes)", bytes.len());
    Ok(())
}
