use std::collections::HashMap;

use earshot_domain::{Offset, Settings, Shape};

/// All shapes with `card_min..=card_max` notes whose top offset lies in
/// `span_min..=span_max`.
///
/// Shapes come out grouped by cardinality, then in lexicographic order.
/// Cardinalities that cannot fit in `span_max` simply contribute nothing.
pub fn generate(card_min: usize, card_max: usize, span_min: Offset, span_max: Offset) -> Vec<Shape> {
    let mut universe = Vec::new();
    let mut steps = Vec::new();
    for notes in card_min.max(1)..=card_max {
        choose(1, notes - 1, span_min, span_max, &mut steps, &mut |chosen| {
            let span = chosen.last().copied().unwrap_or(0);
            if (span_min..=span_max).contains(&span) {
                universe.push(Shape::from_steps(chosen));
            }
        });
    }
    universe
}

/// Visits every strictly increasing choice of `remaining` values from `next..=last`.
fn choose(
    next: Offset,
    remaining: usize,
    span_min: Offset,
    last: Offset,
    steps: &mut Vec<Offset>,
    visit: &mut impl FnMut(&[Offset]),
) {
    if remaining == 0 {
        visit(steps);
        return;
    }
    // the final step is the span, so it can skip straight to span_min
    let start = if remaining == 1 { next.max(span_min) } else { next };
    let mut value = start;
    while value <= last && (last - value) as usize + 1 >= remaining {
        steps.push(value);
        choose(value + 1, remaining - 1, span_min, last, steps, visit);
        steps.pop();
        value += 1;
    }
}

/// Generated shapes plus a reverse index for O(1) lookups.
#[derive(Clone, Debug, Default)]
pub struct Universe {
    shapes: Vec<Shape>,
    index: HashMap<Shape, usize>,
}

impl Universe {
    pub fn new(shapes: Vec<Shape>) -> Self {
        let index = shapes
            .iter()
            .enumerate()
            .map(|(position, shape)| (shape.clone(), position))
            .collect();
        Self { shapes, index }
    }

    pub fn for_settings(settings: &Settings) -> Self {
        Self::new(generate(
            settings.card_min,
            settings.card_max,
            settings.span_min,
            settings.span_max,
        ))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn get(&self, position: usize) -> Option<&Shape> {
        self.shapes.get(position)
    }

    pub fn position(&self, shape: &Shape) -> Option<usize> {
        self.index.get(shape).copied()
    }

    pub fn contains(&self, shape: &Shape) -> bool {
        self.index.contains_key(shape)
    }
}
