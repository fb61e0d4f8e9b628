//! Maps scene primitives onto an `egui::Painter`.
//!
//! The scene builder works in canvas-local coordinates; `origin` translates
//! everything to the allocated widget rect.
use crate::canvas::scene::{Primitive, StrokeSpec, TextAlign};
use eframe::egui::{Align2, FontId, Painter, Pos2, Rounding, Shape, Stroke, Vec2};

fn to_stroke(spec: &StrokeSpec) -> Stroke {
    Stroke::new(spec.width, spec.color)
}

fn translate(points: &[Pos2], origin: Vec2) -> Vec<Pos2> {
    points.iter().map(|p| *p + origin).collect()
}

pub fn paint_primitives(painter: &Painter, origin: Vec2, primitives: &[Primitive]) {
    for primitive in primitives {
        match primitive {
            Primitive::Rect {
                rect,
                rounding,
                fill,
                stroke,
            } => {
                painter.rect(
                    rect.translate(origin),
                    Rounding::same(*rounding),
                    *fill,
                    stroke.as_ref().map(to_stroke).unwrap_or(Stroke::NONE),
                );
            }
            Primitive::Line { from, to, stroke } => {
                painter.line_segment([*from + origin, *to + origin], to_stroke(stroke));
            }
            Primitive::Polyline { points, stroke } => {
                painter.add(Shape::line(translate(points, origin), to_stroke(stroke)));
            }
            Primitive::DashedPolyline {
                points,
                stroke,
                dash_lengths,
                gap_lengths,
            } => {
                painter.extend(Shape::dashed_line_with_offset(
                    &translate(points, origin),
                    to_stroke(stroke),
                    dash_lengths,
                    gap_lengths,
                    0.0,
                ));
            }
            Primitive::Circle {
                center,
                radius,
                fill,
                stroke,
            } => {
                painter.circle(
                    *center + origin,
                    *radius,
                    *fill,
                    stroke.as_ref().map(to_stroke).unwrap_or(Stroke::NONE),
                );
            }
            Primitive::Polygon { points, fill } => {
                painter.add(Shape::convex_polygon(
                    translate(points, origin),
                    *fill,
                    Stroke::NONE,
                ));
            }
            Primitive::Text {
                pos,
                text,
                size,
                color,
                align,
                strong,
            } => {
                let anchor = match align {
                    TextAlign::LeftCenter => Align2::LEFT_CENTER,
                    TextAlign::Center => Align2::CENTER_CENTER,
                };
                // The bundled fonts ship a single weight; emphasis gets a
                // slightly larger face instead.
                let font = FontId::proportional(if *strong { *size + 0.5 } else { *size });
                painter.text(*pos + origin, anchor, text, font, *color);
            }
        }
    }
}
