// ============================================================
// Layer 6 — Diagnostic Plots
// ============================================================
// Every plot draws into a caller-supplied plotters DrawingArea,
// so several plots can share one canvas (split it first) or be
// rendered on their own through `save_png`.
//
//   plot_waveform            — channel 0 against time
//   plot_specgram            — dB STFT of the raw waveform
//   plot_spectrogram         — dB heat map of a power spectrogram
//   plot_class_distribution  — % of samples per class
//   plot_learning_curves     — loss and accuracy per epoch
//
// Heat maps are drawn as one filled rectangle per cell with
// the lowest frequency at the bottom.

use anyhow::{anyhow, ensure, Context, Result};
use plotters::{coord::Shift, prelude::*};
use std::path::Path;

use crate::data::distribution::ClassDistribution;
use crate::data::spectrogram::{power_to_db, power_to_db_default, stft_power, Spectrogram};
use crate::domain::clip::LabelSet;
use crate::ml::trainer::TrainingHistory;

const FONT: &str = "sans-serif";

/// STFT size and overlap used by `plot_specgram`
const SPECGRAM_NFFT:    usize = 256;
const SPECGRAM_OVERLAP: usize = 128;

fn plot_err<E: std::fmt::Debug>(e: E) -> anyhow::Error {
    anyhow!("Plotting failed: {e:?}")
}

/// Render `draw` onto a white PNG canvas of `size` pixels at `path`.
pub fn save_png<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    draw(&root)?;
    root.present()
        .map_err(plot_err)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::info!("Wrote plot '{}'", path.display());
    Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────
/// Time in seconds of each of `n` samples at `sample_rate`.
pub fn time_axis(n: usize, sample_rate: u32) -> Vec<f64> {
    let sr = sample_rate.max(1) as f64;
    (0..n).map(|i| i as f64 / sr).collect()
}

/// (min, max) of `values`, widened so the range is never empty.
pub fn value_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo < 1e-12 {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}

/// Blue (low) → red (high) colour for `v` in [0, 1].
pub fn heat_color(v: f64) -> HSLColor {
    let v = v.clamp(0.0, 1.0);
    HSLColor((1.0 - v) * 240.0 / 360.0, 0.85, 0.5)
}

/// Draw `values` as a heat map. Cell (row r, col c) spans
/// [x0 + c*dx, x0 + (c+1)*dx] × [y0 + r*dy, y0 + (r+1)*dy].
fn draw_heatmap<DB: DrawingBackend>(
    area:   &DrawingArea<DB, Shift>,
    values: &Spectrogram,
    title:  Option<&str>,
    x_desc: &str,
    y_desc: &str,
    (x0, dx): (f64, f64),
    (y0, dy): (f64, f64),
) -> Result<()> {
    ensure!(values.n_rows > 0 && values.n_cols > 0, "Nothing to plot: empty spectrogram");

    let (lo, hi) = value_range([values.min() as f64, values.max() as f64]);
    let x_end = x0 + dx * values.n_cols as f64;
    let y_end = y0 + dy * values.n_rows as f64;

    let mut builder = ChartBuilder::on(area);
    builder.margin(10).x_label_area_size(35).y_label_area_size(55);
    if let Some(title) = title {
        builder.caption(title, (FONT, 20));
    }
    let mut chart = builder.build_cartesian_2d(x0..x_end, y0..y_end).map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series((0..values.n_rows).flat_map(|r| {
            (0..values.n_cols).map(move |c| {
                let v = (values.at(r, c) as f64 - lo) / (hi - lo);
                let x = x0 + c as f64 * dx;
                let y = y0 + r as f64 * dy;
                Rectangle::new([(x, y), (x + dx, y + dy)], heat_color(v).filled())
            })
        }))
        .map_err(plot_err)?;

    Ok(())
}

// ─── Audio plots ──────────────────────────────────────────────────────────────
/// Plot channel 0 of `waveform` against time.
pub fn plot_waveform<DB: DrawingBackend>(
    area:        &DrawingArea<DB, Shift>,
    waveform:    &[Vec<f32>],
    sample_rate: u32,
    title:       &str,
) -> Result<()> {
    let samples = waveform.first().context("Waveform has no channels")?;
    ensure!(!samples.is_empty(), "Waveform has no samples");

    let times  = time_axis(samples.len(), sample_rate);
    let t_end  = times.last().copied().unwrap_or(0.0).max(1e-9);
    let (lo, hi) = value_range(samples.iter().map(|&s| s as f64));

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..t_end, lo..hi)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Amplitude")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            times.iter().zip(samples).map(|(&t, &s)| (t, s as f64)),
            &BLUE,
        ))
        .map_err(plot_err)?;

    Ok(())
}

/// dB spectrogram of channel 0 computed straight from the waveform.
pub fn plot_specgram<DB: DrawingBackend>(
    area:        &DrawingArea<DB, Shift>,
    waveform:    &[Vec<f32>],
    sample_rate: u32,
    title:       &str,
) -> Result<()> {
    let samples = waveform.first().context("Waveform has no channels")?;
    let hop     = SPECGRAM_NFFT - SPECGRAM_OVERLAP;
    let power   = stft_power(samples, SPECGRAM_NFFT, hop, 2.0, false);
    ensure!(
        power.n_cols > 0,
        "Waveform of {} samples is shorter than one {}-point window",
        samples.len(),
        SPECGRAM_NFFT
    );

    let db = power_to_db(&power, 1.0, 1e-10, None);
    let sr = sample_rate.max(1) as f64;

    draw_heatmap(
        area,
        &db,
        Some(title),
        "Time (s)",
        "Frequency (Hz)",
        (0.0, hop as f64 / sr),
        (0.0, sr / SPECGRAM_NFFT as f64),
    )
}

/// Heat map of a power spectrogram (mel or linear) in decibels.
pub fn plot_spectrogram<DB: DrawingBackend>(
    area:     &DrawingArea<DB, Shift>,
    specgram: &Spectrogram,
    title:    Option<&str>,
    ylabel:   &str,
) -> Result<()> {
    let db = power_to_db_default(specgram);
    draw_heatmap(area, &db, title, "frame", ylabel, (0.0, 1.0), (0.0, 1.0))
}

// ─── Dataset / training plots ─────────────────────────────────────────────────
/// Bar chart of the percentage of samples per class.
/// When `labels` is given, class names are printed on the bars.
pub fn plot_class_distribution<DB: DrawingBackend>(
    area:         &DrawingArea<DB, Shift>,
    distribution: &ClassDistribution,
    labels:       Option<&LabelSet>,
    dataset_name: &str,
) -> Result<()> {
    ensure!(!distribution.percent.is_empty(), "Empty class distribution");

    let max_label = distribution.percent.keys().copied().max().unwrap_or(0) as f64;
    let max_pct   = distribution.percent.values().copied().fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Class Distribution in {dataset_name} (in %)"), (FONT, 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..max_label + 0.5, 0f64..(max_pct * 1.1).max(1.0))
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Class Label")
        .y_desc("Percentage of Samples")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(distribution.percent.iter().map(|(&label, &pct)| {
            let x = label as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, pct)], BLUE.mix(0.6).filled())
        }))
        .map_err(plot_err)?;

    if let Some(labels) = labels {
        chart
            .draw_series(distribution.percent.iter().filter_map(|(&label, &pct)| {
                labels
                    .name_of(label)
                    .map(|name| Text::new(name.to_string(), (label as f64 - 0.35, pct), (FONT, 12).into_font()))
            }))
            .map_err(plot_err)?;
    }

    Ok(())
}

/// Loss curves on the left half, accuracy curves on the right half.
pub fn plot_learning_curves<DB: DrawingBackend>(
    area:    &DrawingArea<DB, Shift>,
    history: &TrainingHistory,
) -> Result<()> {
    ensure!(history.epochs_run() > 0, "No epochs recorded");
    let panes = area.split_evenly((1, 2));

    draw_curves(
        &panes[0],
        "Loss",
        &[("train", &history.train_losses, &BLUE), ("validation", &history.val_losses, &RED)],
    )?;
    draw_curves(
        &panes[1],
        "Accuracy (%)",
        &[("train", &history.train_accuracies, &BLUE), ("validation", &history.val_accuracies, &RED)],
    )
}

fn draw_curves<DB: DrawingBackend>(
    area:   &DrawingArea<DB, Shift>,
    title:  &str,
    curves: &[(&str, &Vec<f64>, &RGBColor)],
) -> Result<()> {
    let n_epochs = curves.iter().map(|(_, c, _)| c.len()).max().unwrap_or(0).max(1);
    let (lo, hi) = value_range(curves.iter().flat_map(|(_, c, _)| c.iter().copied()));

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(1f64..(n_epochs as f64).max(2.0), lo..hi)
        .map_err(plot_err)?;

    chart.configure_mesh().x_desc("Epoch").draw().map_err(plot_err)?;

    for &(name, values, color) in curves {
        let color = *color;
        chart
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, &v)| ((i + 1) as f64, v)),
                color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err)?;

    Ok(())
}
