//! Collision detection based on basic shapes.
//!
//! Every contact is reported from the point of view of the first shape: the normal points from
//! the second shape towards the first one, so moving the first shape along the normal by the
//! depth separates the two.

use super::Position;

pub trait HasCollision {
    fn contact_with(&self, other: &dyn HasCollision) -> Option<Contact> {
        self.shape().contact(&other.shape())
    }

    fn shape(&self) -> Shape;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Rectangle {
        position: Position,
        x_length: f64,
        y_length: f64,
    },
    Circle {
        position: Position,
        radius: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub normal: Position,
    pub depth: f64,
    pub point: Position,
}

impl Contact {
    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

impl Shape {
    pub fn contact(&self, other: &Shape) -> Option<Contact> {
        match (self, other) {
            (
                Shape::Circle { position, radius },
                Shape::Circle {
                    position: other_position,
                    radius: other_radius,
                },
            ) => circle_circle(*position, *radius, *other_position, *other_radius),
            (
                Shape::Circle { position, radius },
                Shape::Rectangle {
                    position: other_position,
                    x_length,
                    y_length,
                },
            ) => circle_rectangle(*position, *radius, *other_position, *x_length, *y_length),
            (
                Shape::Rectangle {
                    position,
                    x_length,
                    y_length,
                },
                Shape::Circle {
                    position: other_position,
                    radius,
                },
            ) => circle_rectangle(*other_position, *radius, *position, *x_length, *y_length)
                .map(Contact::flipped),
            (
                Shape::Rectangle {
                    position,
                    x_length,
                    y_length,
                },
                Shape::Rectangle {
                    position: other_position,
                    x_length: other_x_length,
                    y_length: other_y_length,
                },
            ) => {
                let offset = *position - *other_position;
                let overlap_x = (x_length + other_x_length) / 2.0 - offset.x().abs();
                let overlap_y = (y_length + other_y_length) / 2.0 - offset.y().abs();
                if overlap_x <= 0.0 || overlap_y <= 0.0 {
                    return None;
                }
                let (normal, depth) = if overlap_x < overlap_y {
                    (Position::new(offset.x().signum(), 0.0), overlap_x)
                } else {
                    (Position::new(0.0, offset.y().signum()), overlap_y)
                };
                Some(Contact {
                    normal,
                    depth,
                    point: *other_position + offset.scale(0.5),
                })
            }
        }
    }
}

fn circle_circle(
    position: Position,
    radius: f64,
    other_position: Position,
    other_radius: f64,
) -> Option<Contact> {
    let offset = position - other_position;
    let distance = offset.norm();
    let depth = radius + other_radius - distance;
    if depth <= 0.0 {
        return None;
    }
    // Concentric circles have no preferred direction.
    let normal = if distance > f64::EPSILON {
        offset.scale(1.0 / distance)
    } else {
        Position::new(1.0, 0.0)
    };
    Some(Contact {
        normal,
        depth,
        point: other_position + normal.scale(other_radius),
    })
}

fn circle_rectangle(
    position: Position,
    radius: f64,
    rectangle: Position,
    x_length: f64,
    y_length: f64,
) -> Option<Contact> {
    let half_x = x_length / 2.0;
    let half_y = y_length / 2.0;
    let local = position - rectangle;
    let closest = Position::new(
        local.x().clamp(-half_x, half_x),
        local.y().clamp(-half_y, half_y),
    );
    let offset = local - closest;
    let distance = offset.norm();

    if distance > f64::EPSILON {
        let depth = radius - distance;
        if depth <= 0.0 {
            return None;
        }
        return Some(Contact {
            normal: offset.scale(1.0 / distance),
            depth,
            point: rectangle + closest,
        });
    }

    // Centre inside the rectangle: leave through the nearest face.
    let to_x_face = half_x - local.x().abs();
    let to_y_face = half_y - local.y().abs();
    let (normal, face) = if to_x_face < to_y_face {
        let sign = if local.x() >= 0.0 { 1.0 } else { -1.0 };
        (Position::new(sign, 0.0), Position::new(sign * half_x, local.y()))
    } else {
        let sign = if local.y() >= 0.0 { 1.0 } else { -1.0 };
        (Position::new(0.0, sign), Position::new(local.x(), sign * half_y))
    };
    Some(Contact {
        normal,
        depth: to_x_face.min(to_y_face) + radius,
        point: rectangle + face,
    })
}
