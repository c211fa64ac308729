//! Desktop front-end for yt-dlp

use tubegrab::config::Config;
use tubegrab::downloader::Supervisor;
use tubegrab::events::{self, EventQueue, QueueMessage};
use tubegrab::model::{ContainerFormat, DownloadOptions, Framerate, ProgressEvent, Quality, RunOutcome, Status};
use tubegrab::progress;

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::Visuals;
use log::{error, info};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::runtime::Runtime;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    info!("using {} for downloads", config.tool.display_with(&[]));

    let runtime = RUNTIME.get_or_try_init(Runtime::new)?;
    let (events_tx, events) = events::channel();
    let supervisor = Supervisor::new(config.clone(), events_tx, runtime.handle().clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_min_inner_size([900.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(config, supervisor, events))
        }),
    )?;
    Ok(())
}

/// Application state for the GUI
struct DownloaderApp {
    config: Config,
    supervisor: Supervisor,
    events: EventQueue,
    url_input: String,
    output_dir: String,
    quality: Quality,
    framerate: Framerate,
    format: ContainerFormat,
    status: Status,
    progress: ProgressEvent,
    log_lines: Vec<String>,
    /// Errors waiting in the alert window
    alerts: Vec<String>,
    /// True from a successful Download click until `ResetControls`
    controls_locked: bool,
}

impl DownloaderApp {
    fn new(config: Config, supervisor: Supervisor, events: EventQueue) -> Self {
        Self {
            output_dir: config.output_dir.display().to_string(),
            config,
            supervisor,
            events,
            url_input: String::new(),
            quality: Quality::Res1080,
            framerate: Framerate::Auto,
            format: ContainerFormat::Mp4,
            status: Status::Ready,
            progress: idle_progress(),
            log_lines: Vec::new(),
            alerts: Vec::new(),
            controls_locked: false,
        }
    }

    /// Applies every queued worker message, in order
    fn drain_events(&mut self) {
        for msg in self.events.drain() {
            match msg {
                QueueMessage::LogLine(line) => self.log_lines.push(line),
                QueueMessage::StatusChanged(status) => self.status = status,
                QueueMessage::Progress(event) => self.progress = event,
                QueueMessage::ErrorReported(text) => {
                    self.log_lines.push(format!("❌ ERROR: {text}"));
                    self.alerts.push(text);
                }
                QueueMessage::Finished(outcome) => {
                    if let RunOutcome::Error(reason) = &outcome {
                        error!("download errored: {reason}");
                    }
                }
                QueueMessage::ResetControls => self.controls_locked = false,
            }
        }
    }

    fn fetch_info(&mut self) {
        if let Err(e) = self.supervisor.fetch_info(&self.url_input) {
            self.alerts.push(e.to_string());
        }
    }

    fn start_download(&mut self) {
        if self.controls_locked {
            return;
        }
        let options = match DownloadOptions::new(
            &self.url_input,
            self.quality,
            self.framerate,
            self.format,
            self.output_dir.trim(),
        ) {
            Ok(options) => options,
            Err(e) => {
                self.alerts.push(e.to_string());
                return;
            }
        };
        match self.supervisor.download(options) {
            Ok(_) => {
                self.controls_locked = true;
                self.progress = idle_progress();
            }
            Err(e) => self.alerts.push(e.to_string()),
        }
    }

    fn browse_output_dir(&mut self) {
        if let Some(folder) = FileDialog::new().set_directory(&self.output_dir).pick_folder() {
            self.output_dir = folder.display().to_string();
            self.log_lines.push(format!("Output directory set to: {}", self.output_dir));
        }
    }

    fn options_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Quality:");
            egui::ComboBox::from_id_source("quality")
                .selected_text(self.quality.label())
                .show_ui(ui, |ui| {
                    for q in Quality::ALL {
                        ui.selectable_value(&mut self.quality, q, q.label());
                    }
                });

            ui.label("Framerate:");
            egui::ComboBox::from_id_source("framerate")
                .selected_text(self.framerate.label())
                .show_ui(ui, |ui| {
                    for f in Framerate::ALL {
                        ui.selectable_value(&mut self.framerate, f, f.label());
                    }
                });

            ui.label("Format:");
            egui::ComboBox::from_id_source("format")
                .selected_text(self.format.extension())
                .show_ui(ui, |ui| {
                    for f in ContainerFormat::ALL {
                        ui.selectable_value(&mut self.format, f, f.extension());
                    }
                });
        });

        ui.horizontal(|ui| {
            ui.label("Save to:");
            ui.text_edit_singleline(&mut self.output_dir);
            if ui.button("Browse").clicked() {
                self.browse_output_dir();
            }
        });
    }

    fn progress_section(&self, ui: &mut egui::Ui) {
        ui.strong(self.status.to_string());
        ui.add(
            egui::ProgressBar::new(self.progress.percent / 100.0)
                .text(format!("{:.1}%", self.progress.percent)),
        );
        ui.horizontal(|ui| {
            ui.label(progress::format_speed(self.progress.speed_kbps));
            ui.add_space(20.0);
            ui.label(progress::format_eta(self.progress.eta.as_deref()));
        });
    }

    fn buttons_row(&mut self, ui: &mut egui::Ui) {
        let running = self.controls_locked;
        ui.horizontal(|ui| {
            if ui.button("Get Video Info").clicked() {
                self.fetch_info();
            }
            let download = egui::Button::new(egui::RichText::new("⬇️ Download").strong().color(egui::Color32::WHITE))
                .fill(egui::Color32::from_rgb(0x2E, 0x7D, 0x32));
            if ui.add_enabled(!running, download).clicked() {
                self.start_download();
            }
            let stop = egui::Button::new(egui::RichText::new("⏹️ Stop").color(egui::Color32::WHITE))
                .fill(egui::Color32::from_rgb(0xC6, 0x28, 0x28));
            if ui.add_enabled(running, stop).clicked() {
                self.supervisor.request_stop();
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("🗑️ Clear").clicked() {
                    self.log_lines.clear();
                }
            });
        });
    }

    fn alert_window(&mut self, ctx: &egui::Context) {
        if self.alerts.is_empty() {
            return;
        }
        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                for alert in &self.alerts {
                    ui.label(alert);
                }
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.alerts.clear();
        }
    }
}

/// GUI update loop: drains the worker queue, then redraws
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.drain_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| ui.heading("YouTube Video Downloader"));
            ui.add_space(10.0);

            ui.label("Video URL:");
            let url_field = ui.add(
                egui::TextEdit::singleline(&mut self.url_input)
                    .hint_text("Paste YouTube URL here (Ctrl+V)...")
                    .desired_width(f32::INFINITY),
            );
            // a single-line edit gives up focus on Enter
            let enter = ui.input(|i| i.key_pressed(egui::Key::Enter));
            if submits_download(url_field.lost_focus(), enter, !self.alerts.is_empty()) {
                self.start_download();
            }
            ui.add_space(10.0);

            self.options_row(ui);
            ui.separator();
            self.progress_section(ui);
            ui.separator();

            ui.label("Download Log:");
            egui::ScrollArea::vertical()
                .max_height(250.0)
                .auto_shrink([false; 2])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in &self.log_lines {
                        ui.monospace(line);
                    }
                });
            ui.add_space(10.0);

            self.buttons_row(ui);
            ui.weak("Shortcuts: Enter = Download | Ctrl+V = Paste URL");
        });

        self.alert_window(ctx);

        // Request periodic repaint so queued events get drained
        ctx.request_repaint_after(self.config.poll_interval);
    }
}

/// Enter starts a download only when it was pressed in the URL field
fn submits_download(url_field_lost_focus: bool, enter_pressed: bool, alert_open: bool) -> bool {
    url_field_lost_focus && enter_pressed && !alert_open
}

fn idle_progress() -> ProgressEvent {
    ProgressEvent {
        percent: 0.0,
        speed_kbps: 0.0,
        eta: None,
    }
}
