//! Shared directory-page fixtures built without a browser.

#![allow(dead_code)]

use card_extractor::page::{ElementId, ElementSpec, PageSnapshot, SnapshotBuilder};
use card_extractor::Rect;

pub const CARD_WIDTH: f64 = 300.0;
pub const CARD_HEIGHT: f64 = 200.0;

/// A rendered staff directory with its card elements in document order
pub struct Directory {
    pub page: PageSnapshot,
    pub grid: ElementId,
    pub cards: Vec<ElementId>,
}

impl Directory {
    pub fn card_box(&self, index: usize) -> Rect {
        card_rect(index)
    }
}

/// Cards flow three to a row
pub fn card_rect(index: usize) -> Rect {
    let column = (index % 3) as f64;
    let row = (index / 3) as f64;
    Rect::new(
        20.0 + column * (CARD_WIDTH + 20.0),
        100.0 + row * (CARD_HEIGHT + 20.0),
        CARD_WIDTH,
        CARD_HEIGHT,
    )
}

pub fn email_for(index: usize) -> String {
    format!("person{}@lawfirm.com", index)
}

pub fn directory_shell() -> (SnapshotBuilder, ElementId) {
    let mut b = PageSnapshot::builder("https://lawfirm.com/people");
    let body = b.element(None, ElementSpec::new("body").bounds(0.0, 0.0, 1000.0, 3000.0));
    b.element(
        Some(body),
        ElementSpec::new("h1").text("Our People").bounds(20.0, 20.0, 400.0, 50.0),
    );
    let grid = b.element(
        Some(body),
        ElementSpec::new("section")
            .class("team-grid")
            .bounds(0.0, 90.0, 1000.0, 2800.0),
    );
    (b, grid)
}

/// Standard card: name, title, mailto link and phone, laid out top to bottom
pub fn add_card(b: &mut SnapshotBuilder, grid: ElementId, index: usize) -> ElementId {
    let r = card_rect(index);
    let card = b.element(
        Some(grid),
        ElementSpec::new("article")
            .class("team-member")
            .class(&format!("member-{}", index))
            .rect(r),
    );
    b.element(
        Some(card),
        ElementSpec::new("h3")
            .class("name")
            .text(&format!("Person {}", name_suffix(index)))
            .bounds(r.x + 10.0, r.y + 10.0, 200.0, 24.0),
    );
    b.element(
        Some(card),
        ElementSpec::new("p")
            .class("title")
            .text("Senior Partner")
            .bounds(r.x + 10.0, r.y + 40.0, 200.0, 20.0),
    );
    let email = email_for(index);
    b.element(
        Some(card),
        ElementSpec::new("a")
            .attr("href", &format!("mailto:{}", email))
            .text(&email)
            .bounds(r.x + 10.0, r.y + 70.0, 200.0, 20.0),
    );
    b.element(
        Some(card),
        ElementSpec::new("span")
            .class("phone")
            .text(&format!("+1 (555) 010-{:04}", index))
            .bounds(r.x + 10.0, r.y + 100.0, 200.0, 20.0),
    );
    card
}

fn name_suffix(index: usize) -> &'static str {
    const SUFFIXES: [&str; 10] = [
        "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliet",
    ];
    SUFFIXES[index % SUFFIXES.len()]
}

/// Ten identical cards in one grid
pub fn ten_card_directory() -> Directory {
    let (mut b, grid) = directory_shell();
    let cards = (0..10).map(|i| add_card(&mut b, grid, i)).collect();
    Directory {
        page: b.build(),
        grid,
        cards,
    }
}
