//! Report Demo - a multi-page document with header, footer and tables
//!
//! This example shows:
//! - Page decoration with a running page count
//! - Justified paragraphs and flowing text
//! - A bordered, filled table
//! - Internal and external links
//! - An optional Unicode TrueType font (pass its path as the first argument)
//!
//! Run with: RUST_LOG=debug cargo run --example report -p folio-pdf [font.ttf]

use folio_pdf::{
    Align, Border, Color, Document, DocumentConfig, FontSource, LayoutMode, LinkTarget,
    NextPosition, PageDecorator, ZoomMode,
};

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Integer \
nec odio. Praesent libero. Sed cursus ante dapibus diam. Sed nisi. Nulla quis sem at nibh \
elementum imperdiet. Duis sagittis ipsum. Praesent mauris. Fusce nec tellus sed augue semper \
porta. Mauris massa. Vestibulum lacinia arcu eget nulla.";

struct ReportPages {
    title: String,
}

impl PageDecorator for ReportPages {
    fn header(&mut self, doc: &mut Document) -> folio_pdf::Result<()> {
        doc.set_font("Courier", "B", 14.0)?;
        doc.set_fill_color(Color::gray(230));
        doc.cell(0.0, 10.0, &self.title, Border::BOTTOM, NextPosition::NextLine, Align::Center, true)?;
        doc.ln(Some(4.0));
        Ok(())
    }

    fn footer(&mut self, doc: &mut Document) -> folio_pdf::Result<()> {
        doc.set_y(-15.0);
        doc.set_font("Courier", "I", 8.0)?;
        let label = format!("Page {}/{{nb}}", doc.page_no());
        doc.cell(0.0, 10.0, &label, Border::TOP, NextPosition::Right, Align::Center, false)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    std::fs::create_dir_all("output")?;

    let mut doc = Document::builder(DocumentConfig::default())
        .decorator(Box::new(ReportPages {
            title: "Quarterly Report".to_string(),
        }))
        .build()?;
    doc.alias_nb_pages();
    doc.set_title("Quarterly Report");
    doc.set_author("folio-pdf");
    doc.set_display_mode(ZoomMode::FullWidth, LayoutMode::Continuous);

    let body_font = match std::env::args().nth(1) {
        Some(path) => {
            doc.add_font("Body", "", FontSource::TrueType(path.into()))?;
            "Body"
        }
        None => "Courier",
    };

    // ========================================
    // Page 1: text
    // ========================================
    let appendix = doc.add_link();
    doc.add_page()?;
    doc.set_font(body_font, "", 11.0)?;
    doc.multi_cell(0.0, 5.0, LOREM, Border::empty(), Align::Justify, false)?;
    doc.ln(Some(5.0));
    doc.write(5.0, "Flowing text continues at the cursor and wraps at the right margin. ")?;
    doc.write_with_link(5.0, "See the appendix.", Some(LinkTarget::Internal(appendix)))?;
    doc.ln(Some(10.0));
    doc.set_text_color(Color::blue());
    doc.write_with_link(
        5.0,
        "Project homepage",
        Some(LinkTarget::Uri("https://example.com/folio".to_string())),
    )?;
    doc.set_text_color(Color::black());
    doc.ln(Some(10.0));

    // ========================================
    // Table
    // ========================================
    let header = ["Region", "Q1", "Q2", "Q3"];
    let rows = [
        ["North", "1,204", "1,377", "1,512"],
        ["South", "982", "1,046", "1,101"],
        ["East", "1,530", "1,488", "1,623"],
        ["West", "744", "811", "905"],
    ];
    let widths = [50.0, 30.0, 30.0, 30.0];

    doc.set_font("Courier", "B", 10.0)?;
    doc.set_fill_color(Color::rgb(40, 70, 120));
    doc.set_text_color(Color::white());
    doc.set_draw_color(Color::rgb(40, 70, 120));
    doc.set_line_width(0.3);
    for (label, w) in header.iter().zip(widths) {
        doc.cell(w, 7.0, label, Border::ALL, NextPosition::Right, Align::Center, true)?;
    }
    doc.ln(None);

    doc.set_font("Courier", "", 10.0)?;
    doc.set_fill_color(Color::rgb(224, 235, 255));
    doc.set_text_color(Color::black());
    for (i, row) in rows.iter().enumerate() {
        let fill = i % 2 == 1;
        for (j, (value, w)) in row.iter().zip(widths).enumerate() {
            let align = if j == 0 { Align::Left } else { Align::Right };
            doc.cell(w, 6.0, value, Border::LEFT | Border::RIGHT, NextPosition::Right, align, fill)?;
        }
        doc.ln(None);
    }
    doc.cell(widths.iter().sum(), 0.0, "", Border::TOP, NextPosition::Right, Align::Left, false)?;

    // ========================================
    // Page 2: appendix
    // ========================================
    doc.add_page()?;
    doc.set_link(appendix, None, None)?;
    doc.set_font(body_font, "", 11.0)?;
    for i in 1..=40 {
        doc.multi_cell(0.0, 5.0, &format!("{i}. {LOREM}"), Border::empty(), Align::Left, false)?;
    }

    doc.save("output/report.pdf")?;
    println!("Wrote output/report.pdf ({} pages)", doc.page_no());
    Ok(())
}
