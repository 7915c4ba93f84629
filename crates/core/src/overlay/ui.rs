//! Overlay widgets: the crosshair menu and the crosshair itself

use egui::{Color32, LayerId, Pos2, Stroke, Vec2};

use crate::config::CrosshairConfig;

/// Widget state, edited in place by the menu
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayUi {
    pub crosshair: CrosshairConfig,
    pub show_click_rate: bool,
}

impl OverlayUi {
    pub fn new(crosshair: CrosshairConfig, show_click_rate: bool) -> Self {
        Self {
            crosshair,
            show_click_rate,
        }
    }

    /// Draw one frame of UI: windows first, then background primitives
    pub fn show(&mut self, ctx: &egui::Context, clicks_per_second: u32) {
        self.menu(ctx, clicks_per_second);
        self.draw_crosshair(ctx);
    }

    fn menu(&mut self, ctx: &egui::Context, clicks_per_second: u32) {
        let crosshair = &mut self.crosshair;
        let show_click_rate = self.show_click_rate;

        egui::Window::new("Crosshair")
            .default_pos([10.0, 100.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.checkbox(&mut crosshair.enabled, "Enable Crosshair");
                ui.add(egui::Slider::new(&mut crosshair.half_length_x, 5.0..=100.0).text("Length X"));
                ui.add(egui::Slider::new(&mut crosshair.half_length_y, 5.0..=100.0).text("Length Y"));
                ui.add(egui::Slider::new(&mut crosshair.thickness, 1.0..=6.0).text("Thickness"));

                ui.horizontal(|ui| {
                    let mut rgba = crosshair.color.map(|c| c as f32 / 255.0);
                    if ui.color_edit_button_rgba_unmultiplied(&mut rgba).changed() {
                        crosshair.color = rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
                    }
                    ui.label("Color");
                });

                if show_click_rate {
                    ui.separator();
                    ui.label(format!("CPS: {clicks_per_second}"));
                }
            });
    }

    fn draw_crosshair(&self, ctx: &egui::Context) {
        if !self.crosshair.enabled {
            return;
        }

        let pixels_per_point = ctx.pixels_per_point();
        let center = ctx.screen_rect().center();
        let [r, g, b, a] = self.crosshair.color;
        let stroke = Stroke::new(
            self.crosshair.thickness / pixels_per_point,
            Color32::from_rgba_unmultiplied(r, g, b, a),
        );

        let painter = ctx.layer_painter(LayerId::background());
        for segment in crosshair_segments(center, &self.crosshair, pixels_per_point) {
            painter.line_segment(segment, stroke);
        }
    }
}

/// Horizontal then vertical line through `center`, in points
///
/// Half-lengths are configured in surface pixels.
pub fn crosshair_segments(
    center: Pos2,
    crosshair: &CrosshairConfig,
    pixels_per_point: f32,
) -> [[Pos2; 2]; 2] {
    let dx = Vec2::new(crosshair.half_length_x / pixels_per_point, 0.0);
    let dy = Vec2::new(0.0, crosshair.half_length_y / pixels_per_point);
    [[center - dx, center + dx], [center - dy, center + dy]]
}
