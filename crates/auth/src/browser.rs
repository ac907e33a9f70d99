// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::debug;

use crate::code_provider::UrlOpener;

/// Opens URLs with the platform's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl SystemBrowser {
    /// Program and leading arguments; the URL is appended.
    pub fn opener_command() -> (&'static str, &'static [&'static str]) {
        if cfg!(target_os = "macos") {
            ("open", &[])
        } else if cfg!(target_os = "windows") {
            ("rundll32", &["url.dll,FileProtocolHandler"])
        } else {
            ("xdg-open", &[])
        }
    }
}

impl UrlOpener for SystemBrowser {
    fn open_url(&self, url: &str) -> anyhow::Result<()> {
        let (program, args) = Self::opener_command();
        debug!(program, "opening browser");
        let mut child = Command::new(program)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {program}"))?;
        std::thread::spawn(move || {
            if let Err(e) = child.wait() {
                debug!("browser opener wait failed: {e}");
            }
        });
        Ok(())
    }
}
