//! Paint commands produced from a layout

use crate::config::Color;
use crate::rendering::layout::{LayoutKind, LayoutNode, CHAR_WIDTH};
use crate::rewrite::{Placeholder, PLACEHOLDER_LABEL};

const TEXT_COLOR: Color = Color::rgb(0x22, 0x22, 0x22);
const RULE_COLOR: Color = Color::rgb(0xdd, 0xdd, 0xdd);
const LABEL_SCALE: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: Color,
    },
    DashedBorder {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        thickness: u32,
        color: Color,
    },
    Text {
        x: i32,
        y: i32,
        lines: Vec<String>,
        scale: u32,
        color: Color,
    },
    /// Draw loaded image `index` stretched over the rect
    Image {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        index: usize,
    },
}

/// Translate positioned nodes into paint commands, background first
pub fn paint_layout(nodes: &[LayoutNode], canvas_width: u32, canvas_height: u32, background: Color) -> Vec<PaintCommand> {
    let mut cmds = vec![PaintCommand::SolidRect {
        x: 0,
        y: 0,
        width: canvas_width,
        height: canvas_height,
        color: background,
    }];

    for node in nodes {
        let r = &node.rect;
        match &node.kind {
            LayoutKind::Text { lines, scale } => cmds.push(PaintCommand::Text {
                x: r.x,
                y: r.y,
                lines: lines.clone(),
                scale: *scale,
                color: TEXT_COLOR,
            }),
            LayoutKind::Image { index } => cmds.push(PaintCommand::Image {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                index: *index,
            }),
            LayoutKind::Placeholder => paint_placeholder(&mut cmds, r.x, r.y, r.width, r.height),
            LayoutKind::Rule => cmds.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                color: RULE_COLOR,
            }),
        }
    }
    cmds
}

fn paint_placeholder(cmds: &mut Vec<PaintCommand>, x: i32, y: i32, width: u32, height: u32) {
    cmds.push(PaintCommand::SolidRect {
        x,
        y,
        width,
        height,
        color: Placeholder::FILL,
    });
    cmds.push(PaintCommand::DashedBorder {
        x,
        y,
        width,
        height,
        thickness: Placeholder::BORDER_WIDTH,
        color: Placeholder::BORDER,
    });

    // centered label
    let label_w = PLACEHOLDER_LABEL.chars().count() as u32 * CHAR_WIDTH * LABEL_SCALE;
    let label_h = super::layout::LINE_HEIGHT * LABEL_SCALE;
    if label_w <= width && label_h <= height {
        cmds.push(PaintCommand::Text {
            x: x.saturating_add(((width - label_w) / 2) as i32),
            y: y.saturating_add(((height - label_h) / 2) as i32),
            lines: vec![PLACEHOLDER_LABEL.to_string()],
            scale: LABEL_SCALE,
            color: Placeholder::LABEL,
        });
    }
}
