use logchunk_core::{ProcessingReport, ProfileManager, Severity};

/// Print chunk counts, oversized chunks and triggered alerts.
pub fn print_report_summary(report: &ProcessingReport) {
    let stats = &report.stats;
    println!("📊 Chunk metrics:");
    println!("   - Chunks: {}", stats.chunk_count);
    println!(
        "   - Size: min {} / mean {:.1} / max {}",
        stats.min_size, stats.mean_size, stats.max_size
    );
    for (level, count) in &stats.chunks_per_level {
        println!("   - Level {level}: {count}");
    }

    if stats.oversized_count > 0 {
        println!("⚠️  {} oversized chunk(s):", stats.oversized_count);
        for (index, chunk) in report.chunks.iter().enumerate().filter(|(_, c)| c.oversized) {
            println!("   #{index} ({} units): {:?}", chunk.size, chunk.preview(40));
        }
    }

    if report.alerts.is_empty() {
        println!("✅ No alerts triggered");
        return;
    }

    println!("🚨 Alerts:");
    for alert in &report.alerts {
        println!(
            "   {} [{}] {} - chunks {:?}",
            severity_icon(alert.severity),
            alert.severity,
            alert.description,
            alert.chunk_indices
        );
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Medium => "🟡",
        Severity::Low => "🔵",
    }
}

pub fn show_profiles(manager: &ProfileManager) {
    println!("\n📋 Available Profiles:");
    for name in manager.names() {
        if let Some(profile) = manager.get(name) {
            let c = &profile.chunking;
            println!(
                "  {:<10} max={:<5} min={:<4} overlap={:<4} levels={}  {}",
                name,
                c.max_size,
                c.min_size,
                c.overlap_size,
                profile.levels.len(),
                profile.description
            );
        }
    }

    println!("\n📄 Output Formats:");
    println!("  report  - Full report: chunks, metadata, alerts, hashes (default)");
    println!("  chunks  - One record per chunk with its metadata");
    println!("  flat    - Simple array of chunk texts (minimal format)");

    println!("\n📝 Usage Examples:");
    println!("  logchunk -i run.log");
    println!("  logchunk -i run.log -p alert -o alerts.json");
    println!("  logchunk -i run.log -c profile.yaml -f flat --max-size 800");
}
