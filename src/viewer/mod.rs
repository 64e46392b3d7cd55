//! Manual-sync visualizer
//!
//! Shows phone and watch accelerometer traces in two stacked plots whose
//! x axes are linked, so a researcher can line up a shared motion (a clap,
//! a shake) and read off the clock offset between the devices.
//!
//! # Main Types
//!
//! - [`SyncData`] - the loaded series and the offsets applied to them
//! - [`SyncViewerApp`] - the eframe application drawing them

use egui::Color32;
use egui_plot::{Corner, Legend, Line, Plot, PlotPoints};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{DataCollectError, Result};
use crate::raw::InertialSeries;
use crate::types::DeviceType;

/// Plot id shared by both plots to link their x axes
const LINK_GROUP: &str = "sync";

/// Accelerometer axes drawn for each device
const ACC_AXES: [&str; 3] = ["acc_x", "acc_y", "acc_z"];

const AXIS_COLORS: [Color32; 3] = [Color32::RED, Color32::GREEN, Color32::LIGHT_BLUE];

/// One named polyline ready for plotting
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

/// Series displayed by the viewer
#[derive(Debug, Clone, Default)]
pub struct SyncData {
    pub phone: Option<InertialSeries>,
    pub phone_path: Option<PathBuf>,
    pub watch: Option<InertialSeries>,
    pub watch_path: Option<PathBuf>,
    /// Configured phone offset, applied as is
    pub phone_offset_ms: i64,
    /// Configured watch offset, before manual shifting
    pub watch_base_offset_ms: i64,
    /// Manual shift of the watch series
    pub watch_shift_ms: i64,
}

impl SyncData {
    /// Start from the offsets of a configuration
    pub fn new(config: &Config) -> Self {
        Self {
            phone_offset_ms: config.offset_ms(DeviceType::SensorLogger),
            watch_base_offset_ms: config.offset_ms(DeviceType::Watch),
            ..Self::default()
        }
    }

    /// Load a SensorLogger directory or its `Accelerometer.csv`
    pub fn load_phone(&mut self, path: &Path) -> Result<()> {
        let series = InertialSeries::load_sensorlogger(path)?;
        tracing::info!("Loaded {} phone samples from {}", series.len(), path.display());
        self.phone = Some(series);
        self.phone_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Load a headerless watch CSV
    pub fn load_watch(&mut self, path: &Path) -> Result<()> {
        let series = InertialSeries::load_watch(path)?;
        tracing::info!("Loaded {} watch samples from {}", series.len(), path.display());
        self.watch = Some(series);
        self.watch_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Watch offset that would reproduce the current alignment
    pub fn suggested_watch_offset(&self) -> i64 {
        self.watch_base_offset_ms + self.watch_shift_ms
    }

    pub fn phone_traces(&self) -> Vec<Trace> {
        traces("phone", self.phone.as_ref(), self.phone_offset_ms)
    }

    pub fn watch_traces(&self) -> Vec<Trace> {
        traces("watch", self.watch.as_ref(), self.suggested_watch_offset())
    }
}

fn traces(prefix: &str, series: Option<&InertialSeries>, offset_ms: i64) -> Vec<Trace> {
    let Some(series) = series else {
        return Vec::new();
    };
    ACC_AXES
        .iter()
        .filter_map(|axis| {
            let column = series.column_index(axis)?;
            Some(Trace {
                name: format!("{} {}", prefix, axis),
                points: series.column_points(column, offset_ms),
            })
        })
        .collect()
}

/// The sync viewer window
pub struct SyncViewerApp {
    data: SyncData,
    /// Last load error, shown in the toolbar
    status: Option<String>,
}

impl SyncViewerApp {
    pub fn new(data: SyncData) -> Self {
        Self { data, status: None }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open phone...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Open SensorLogger recording")
                    .pick_folder()
                {
                    self.status = self.data.load_phone(&path).err().map(|e| e.to_string());
                }
            }
            if ui.button("Open watch...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Open watch recording")
                    .add_filter("CSV", &["csv"])
                    .pick_file()
                {
                    self.status = self.data.load_watch(&path).err().map(|e| e.to_string());
                }
            }

            ui.separator();
            ui.label("Watch shift:");
            ui.add(
                egui::DragValue::new(&mut self.data.watch_shift_ms)
                    .speed(10.0)
                    .suffix(" ms"),
            );
            if ui.button("Log offset").clicked() {
                tracing::info!(
                    "Suggested [devices.watch] msec_offset = {}",
                    self.data.suggested_watch_offset()
                );
            }

            if let Some(status) = &self.status {
                ui.separator();
                ui.colored_label(Color32::RED, status);
            }
        });
    }
}

fn show_plot(ui: &mut egui::Ui, name: &str, traces: &[Trace], height: f32) {
    let response = Plot::new(name)
        .height(height)
        .link_axis(LINK_GROUP, [true, false])
        .link_cursor(LINK_GROUP, [true, false])
        .x_axis_label("Time (ms)")
        .legend(Legend::default().position(Corner::RightTop))
        .show(ui, |plot_ui| {
            for (trace, color) in traces.iter().zip(AXIS_COLORS.iter().cycle()) {
                let line = Line::new(trace.name.as_str(), PlotPoints::from(trace.points.clone()))
                    .color(*color);
                plot_ui.line(line);
            }
        });

    if response.response.clicked() {
        if let Some(pos) = response.response.interact_pointer_pos() {
            let value = response.transform.value_from_position(pos);
            tracing::info!("{}: clicked at x={:.0} ms, y={:.3}", name, value.x, value.y);
        }
    }
}

impl eframe::App for SyncViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("sync_toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let height = (ui.available_height() / 2.0 - ui.spacing().item_spacing.y).max(100.0);
            show_plot(ui, "phone", &self.data.phone_traces(), height);
            show_plot(ui, "watch", &self.data.watch_traces(), height);
        });
    }
}

/// Open the viewer window and block until it closes
pub fn run(data: SyncData) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("datacollect sync-view"),
        ..Default::default()
    };

    eframe::run_native(
        "datacollect sync-view",
        native_options,
        Box::new(|_cc| Ok(Box::new(SyncViewerApp::new(data)))),
    )
    .map_err(|e| DataCollectError::Viewer(e.to_string()))
}
