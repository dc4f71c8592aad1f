use std::path::Path;

use console::Style;
use luckystack_core::pipeline::{PipelineConfig, PipelineOutcome, PipelineStatus};
use luckystack_core::sharpen::WaveletParams;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            warning: Style::new().yellow(),
        }
    }
}

pub fn print_pipeline_summary(config: &PipelineConfig, input: &Path, output: &Path, frames: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("LuckyStack Pipeline"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(19)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(frames)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!();

    let sel = &config.selection;
    println!("  {}", s.header.apply_to("Selection"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Keep"),
        s.value.apply_to(format!("{:.0}%", sel.keep_percentage * 100.0))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(format!("{}..={}", sel.min_frames, sel.max_frames))
    );
    if let Some(window) = sel.temporal_window {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Window"),
            s.value.apply_to(window)
        );
    }
    println!();

    let al = &config.alignment;
    println!("  {}", s.header.apply_to("Alignment"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Global"),
        s.method.apply_to(format!("phase correlation, min confidence {}", al.confidence_threshold))
    );
    if al.enable_local_align {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Local"),
            s.method.apply_to(format!("{} px tiles, {} warp", al.tile_size, al.interpolation))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Local"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Stacking"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to("weighted sigma clip")
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sigma"),
        s.value.apply_to(config.stacking.sigma)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.stacking.iterations)
    );
    println!();

    match config.sharpening {
        Some(ref params) => print_sharpening_section(&s, params),
        None => {
            println!(
                "  {:<14}{}",
                s.header.apply_to("Sharpening"),
                s.disabled.apply_to("disabled")
            );
            println!();
        }
    }
}

pub fn print_sharpen_summary(params: &WaveletParams) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Sharpening"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(10)));
    println!();

    print_sharpening_section(&s, params);
}

fn print_sharpening_section(s: &Styles, params: &WaveletParams) {
    println!("  {}", s.header.apply_to("Sharpening"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Wavelet"),
        s.value.apply_to(format!("{} layers", params.num_layers))
    );
    println!("    {:<12}{:?}", s.label.apply_to("Gains"), params.gains);
    println!();
}

pub fn print_outcome(outcome: &PipelineOutcome) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    let status = match outcome.status {
        PipelineStatus::Done => s.method.apply_to("done".to_string()),
        PipelineStatus::Cancelled => s.disabled.apply_to("cancelled".to_string()),
        PipelineStatus::Failed(ref e) => s.warning.apply_to(format!("failed: {e}")),
    };
    println!("    {:<12}{}", s.label.apply_to("Status"), status);
    println!(
        "    {:<12}{}",
        s.label.apply_to("Analyzed"),
        s.value.apply_to(outcome.records.len())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Selected"),
        s.value.apply_to(outcome.selected.len())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Stacked"),
        s.value.apply_to(outcome.alignments.len())
    );
    if let Some(reference) = outcome.reference_index {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Reference"),
            s.value.apply_to(format!("frame {reference}"))
        );
    }
    let low = outcome.alignments.iter().filter(|a| a.low_confidence).count();
    if low > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Unshifted"),
            s.warning.apply_to(format!("{low} low-confidence frame(s)"))
        );
    }

    if !outcome.diagnostics.is_empty() {
        println!();
        println!("  {}", s.header.apply_to("Diagnostics"));
        for diag in &outcome.diagnostics {
            println!(
                "    {:<12}{} {}",
                s.label.apply_to(format!("frame {}", diag.frame_index)),
                s.warning.apply_to(format!("[{}]", diag.stage)),
                diag.reason
            );
        }
    }
}
