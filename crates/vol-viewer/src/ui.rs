//! HUD overlays: performance counter and flow status.

/// Exponentially smoothed frames-per-second estimate.
pub struct FpsCounter {
    smoothed: f32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self { smoothed: 0.0 }
    }

    /// Feeds one frame interval; returns the updated estimate.
    pub fn update(&mut self, dt: f32) -> f32 {
        if dt > 0.0 {
            let instant = 1.0 / dt;
            self.smoothed = if self.smoothed == 0.0 {
                instant
            } else {
                self.smoothed * 0.9 + instant * 0.1
            };
        }
        self.smoothed
    }

    pub fn fps(&self) -> f32 {
        self.smoothed
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// What the HUD reports about the running flow this frame.
pub enum HudStatus<'a> {
    Loading,
    Failed(&'a str),
    Slices { depth: f32, layers: u32 },
    Character { clip: Option<&'a str>, time: f32 },
}

/// Draws the corner overlay: FPS plus the flow status line.
pub fn draw_hud(ctx: &egui::Context, fps: f32, status: &HudStatus<'_>) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .show(ctx, |ui| {
            egui::Frame::none()
                .fill(egui::Color32::from_black_alpha(160))
                .inner_margin(egui::Margin::same(6.0))
                .show(ui, |ui| {
                    ui.label(
                        egui::RichText::new(format!("{fps:>5.0} FPS"))
                            .monospace()
                            .color(egui::Color32::LIGHT_GREEN),
                    );

                    match status {
                        HudStatus::Loading => {
                            ui.label(egui::RichText::new("loading…").italics());
                        }
                        HudStatus::Failed(message) => {
                            ui.label(
                                egui::RichText::new(format!("load failed: {message}"))
                                    .color(egui::Color32::LIGHT_RED),
                            );
                        }
                        HudStatus::Slices { depth, layers } => {
                            ui.label(
                                egui::RichText::new(format!("slice {depth:>6.1} / {layers}"))
                                    .monospace(),
                            );
                        }
                        HudStatus::Character { clip, time } => {
                            let name = clip.unwrap_or("(no clip)");
                            ui.label(
                                egui::RichText::new(format!("{name} @ {time:>5.2}s")).monospace(),
                            );
                        }
                    }
                });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_converges_on_a_steady_cadence() {
        let mut fps = FpsCounter::new();

        for _ in 0..200 {
            fps.update(1.0 / 60.0);
        }

        assert!((fps.fps() - 60.0).abs() < 1.0);
    }

    #[test]
    fn fps_counter_ignores_zero_intervals() {
        let mut fps = FpsCounter::new();
        fps.update(1.0 / 30.0);
        let before = fps.fps();

        fps.update(0.0);
        assert_eq!(fps.fps(), before);
    }
}
