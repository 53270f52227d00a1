use std::time::Duration;

use egui::{Color32, Rect, Sense, Stroke, Vec2};
use log::{debug, trace, warn};
use pathfind::{AStar, Grid, Point, Role, SearchOutcome, SearchState, Step};

use crate::edit;

const FRAME_DELAY: Duration = Duration::from_millis(16);

const ORANGE: Color32 = Color32::from_rgb(255, 165, 0);
const TURQUOISE: Color32 = Color32::from_rgb(64, 224, 208);
const PURPLE: Color32 = Color32::from_rgb(128, 0, 128);

pub struct App {
    settings: Settings,
    grid: Grid,
    search: Option<AStar>,
    output_cell: String,
}

/// We derive Deserialize/Serialize so we can persist the settings on shutdown.
/// The grid itself always starts out fresh.
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
struct Settings {
    rows: usize,
    /// Width of the whole grid in pixels
    width: usize,
    auto_step: bool,
    steps_per_frame: usize,
    draw_grid_lines: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rows: 50,
            width: 800,
            auto_step: true,
            steps_per_frame: 1,
            draw_grid_lines: true,
        }
    }
}

impl App {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Load previous settings (if any).
        // Note that you must enable the `persistence` feature for this to work.
        let settings: Settings = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Default::default()
        };

        App {
            grid: Grid::new(settings.rows, settings.width),
            settings,
            search: None,
            output_cell: Default::default(),
        }
    }

    fn is_running(&self) -> bool {
        self.search
            .as_ref()
            .is_some_and(|search| !search.state().is_done())
    }

    /// Discards the grid and starts over with an empty one
    fn clear(&mut self) {
        debug!("clearing {}x{} grid", self.settings.rows, self.settings.rows);
        self.grid = Grid::new(self.settings.rows, self.settings.width);
        self.search = None;
        self.output_cell.clear();
    }

    fn start_search(&mut self) {
        let Some((start, goal)) = self.grid.endpoints() else {
            debug!("cannot search without both a start and an end");
            return;
        };

        self.grid.clear_search();
        match AStar::new(&self.grid, start, goal) {
            Ok(search) => self.search = Some(search),
            Err(e) => warn!("{}", e),
        }
    }

    fn cancel_search(&mut self) {
        if let Some(search) = &mut self.search {
            search.cancel(&mut self.grid);
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }

        let (space, clear, escape) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::C),
                i.key_pressed(egui::Key::Escape),
            )
        });

        if space && !self.is_running() {
            self.start_search();
        }
        if clear {
            self.clear();
        }
        if escape {
            self.cancel_search();
        }
    }

    /// Runs the configured number of steps for this frame and schedules the next one
    fn advance(&mut self, ctx: &egui::Context) {
        if !self.settings.auto_step || !self.is_running() {
            return;
        }

        if let Some(search) = &mut self.search {
            for _ in 0..self.settings.steps_per_frame {
                if search.step(&mut self.grid) == Step::Finished {
                    break;
                }
            }
        }
        ctx.request_repaint_after(FRAME_DELAY);
    }

    fn edit(&mut self, point: Point, primary: bool) {
        // the grid stays fixed while a search is running
        if self.is_running() {
            return;
        }
        // first edit after a finished run removes what it painted
        if self.search.take().is_some() {
            self.grid.clear_search();
        }

        let result = if primary {
            edit::paint(&mut self.grid, point)
        } else {
            edit::erase(&mut self.grid, point)
        };
        if let Err(e) = result {
            trace!("edit rejected: {}", e);
        }
    }

    fn point_at(&self, offset: Vec2) -> Option<Point> {
        if offset.x < 0.0 || offset.y < 0.0 {
            return None;
        }
        self.grid.point_at(offset.x as usize, offset.y as usize)
    }

    fn describe(&self, point: Point) -> String {
        let cell = self.grid.cell(point);
        let mut text = format!("Cell @{}:{}\n{}", point.row, point.col, cell.role());
        if cell.is_permanent() {
            text.push_str(" (border)");
        }
        if let Some(search) = &self.search {
            if let Some(g) = search.g_score(point) {
                text.push_str(&format!("\ng = {}", g));
            }
            if let Some(f) = search.f_score(point) {
                text.push_str(&format!("\nf = {}", f));
            }
            if let Some(from) = search.predecessor(point) {
                text.push_str(&format!("\nfrom {}", from));
            }
        }
        text
    }

    fn paint_grid(&mut self, ui: &mut egui::Ui) {
        let size = self.grid.cell_size() as f32;
        let side = size * self.grid.rows() as f32;
        let (response, painter) = ui.allocate_painter(Vec2::splat(side), Sense::click_and_drag());
        let origin = response.rect.min;

        for cell in self.grid.cells() {
            let min = origin + egui::vec2(cell.col() as f32 * size, cell.row() as f32 * size);
            painter.rect_filled(
                Rect::from_min_size(min, Vec2::splat(size)),
                0.0,
                role_color(cell.role()),
            );
        }

        if self.settings.draw_grid_lines {
            let stroke = Stroke::new(1.0, Color32::GRAY);
            for i in 0..=self.grid.rows() {
                let offset = i as f32 * size;
                painter.line_segment(
                    [
                        origin + egui::vec2(0.0, offset),
                        origin + egui::vec2(side, offset),
                    ],
                    stroke,
                );
                painter.line_segment(
                    [
                        origin + egui::vec2(offset, 0.0),
                        origin + egui::vec2(offset, side),
                    ],
                    stroke,
                );
            }
        }

        // get the cell the user is hovering over
        if let Some(point) = response
            .hover_pos()
            .and_then(|pos| self.point_at(pos - origin))
        {
            self.output_cell = self.describe(point);
        }

        let (primary, secondary) =
            ui.input(|i| (i.pointer.primary_down(), i.pointer.secondary_down()));
        if primary || secondary {
            let pointer = response.interact_pointer_pos().or(response.hover_pos());
            if let Some(point) = pointer.and_then(|pos| self.point_at(pos - origin)) {
                self.edit(point, primary);
            }
        }
    }
}

fn role_color(role: Role) -> Color32 {
    match role {
        Role::Empty => Color32::WHITE,
        Role::Barrier => Color32::BLACK,
        Role::Start => ORANGE,
        Role::End => TURQUOISE,
        Role::Frontier => Color32::GREEN,
        Role::Visited => Color32::RED,
        Role::Path => PURPLE,
    }
}

fn status_text(search: Option<&AStar>) -> String {
    let Some(search) = search else {
        return "Place a start and an end, then press space".to_string();
    };

    match search.state() {
        SearchState::Searching => format!("Searching, {} cells in frontier", search.frontier_len()),
        SearchState::Tracing { route, .. } => format!("Tracing path of {} moves", route.length),
        SearchState::Done(SearchOutcome::Found(route)) => {
            format!("Path found: {} moves", route.length)
        }
        SearchState::Done(SearchOutcome::NotFound) => "No path found".to_string(),
        SearchState::Done(SearchOutcome::Cancelled) => "Search cancelled".to_string(),
    }
}

impl eframe::App for App {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.settings);
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);
        self.advance(ctx);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.add_space(16.0);

                egui::widgets::global_dark_light_mode_buttons(ui);
            });
        });

        egui::SidePanel::left("side_panel").show(ctx, |ui| {
            let running = self.is_running();

            ui.label("Grid");
            let mut rows = self.settings.rows;
            ui.add_enabled(
                !running,
                egui::DragValue::new(&mut rows)
                    .clamp_range(3..=200)
                    .prefix("rows: "),
            );
            if rows != self.settings.rows {
                self.settings.rows = rows;
                self.clear();
            }
            ui.checkbox(&mut self.settings.draw_grid_lines, "Draw grid lines");
            if ui.button("Clear (C)").clicked() {
                self.clear();
            }

            ui.separator();
            ui.label("Pathfinder");
            ui.horizontal(|ui| {
                let ready = !running && self.grid.endpoints().is_some();
                if ui
                    .add_enabled(ready, egui::Button::new("Start (space)"))
                    .clicked()
                {
                    self.start_search();
                }
                if ui.add_enabled(running, egui::Button::new("Cancel (esc)")).clicked() {
                    self.cancel_search();
                }
            });
            ui.horizontal(|ui| {
                if let Some(search) = &mut self.search {
                    if ui.add_enabled(running, egui::Button::new("Step")).clicked() {
                        search.step(&mut self.grid);
                    }
                    if ui.add_enabled(running, egui::Button::new("Finish")).clicked() {
                        search.finish(&mut self.grid);
                    }
                }
            });
            ui.checkbox(&mut self.settings.auto_step, "Auto Step");
            ui.add(
                egui::Slider::new(&mut self.settings.steps_per_frame, 1..=100)
                    .text("steps per frame"),
            );

            ui.separator();
            ui.label(status_text(self.search.as_ref()));
            ui.label(&self.output_cell);

            ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
                ui.label("Left click: start, end, barriers\nRight click: erase");
                egui::warn_if_debug_build(ui);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                self.paint_grid(ui);
            });
        });
    }
}
