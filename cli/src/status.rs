//! Status indicator drawn on a single stderr line.

use std::io::{self, Write};

use fsls_lsp::{StatusBar, StatusItem};

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrStatusBar;

impl StatusBar for StderrStatusBar {
    fn create_item(&mut self) -> Box<dyn StatusItem> {
        Box::new(StderrStatusItem::default())
    }
}

#[derive(Default)]
struct StderrStatusItem {
    text: String,
    visible: bool,
}

impl StderrStatusItem {
    fn draw(&self) {
        let mut err = io::stderr().lock();
        // \x1b[2K clears the line the cursor is on.
        let _ = write!(err, "\r\x1b[2K{}", self.text);
        let _ = err.flush();
    }

    fn clear(&self) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K");
        let _ = err.flush();
    }
}

impl StatusItem for StderrStatusItem {
    fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
        if self.visible {
            self.draw();
        }
    }

    fn show(&mut self) {
        self.visible = true;
        self.draw();
    }

    fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.clear();
        }
    }
}

impl Drop for StderrStatusItem {
    fn drop(&mut self) {
        self.hide();
    }
}
