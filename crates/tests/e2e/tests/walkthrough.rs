//! Video Walkthrough - Placeholder
//!
//! The full automated video walkthrough is implemented in TypeScript using Playwright.
//!
//! ## Usage
//! ```bash
//! cd scripts/video-walkthrough
//! bun install
//! bun run walkthrough.ts           # Run walkthrough (no recording)
//! bun run walkthrough.ts --record  # Run with video recording
//! ```
//!
//! See `scripts/video-walkthrough/walkthrough.ts` for the full implementation.

#![allow(clippy::unwrap_used, clippy::expect_used)] // expect/unwrap is fine in tests

#[test]
fn walkthrough_info() {
    println!("\n══════════════════════════════════════════════════════════════");
    println!("  VIDEO WALKTHROUGH");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("  The video walkthrough uses TypeScript + Playwright for better");
    println!("  browser automation and video recording support.");
    println!();
    println!("  To run:");
    println!("    cd scripts/video-walkthrough");
    println!("    bun install");
    println!("    bun run walkthrough.ts --record");
    println!();
    println!("══════════════════════════════════════════════════════════════\n");
}
