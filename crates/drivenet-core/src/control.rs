use serde::{Deserialize, Serialize};

/// Four independent, non-exclusive control channels. The whole struct is
/// overwritten every tick, by manual input or by network output, never
/// partially.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl ControlState {
    pub const NONE: ControlState = ControlState {
        forward: false,
        backward: false,
        left: false,
        right: false,
    };

    /// Map network outputs to channels in wire order: forward, left, right,
    /// backward. The threshold activation emits exactly 0 or 1, so equality
    /// against 1 is exact.
    pub fn from_outputs(outputs: &[f32; 4]) -> Self {
        Self {
            forward: outputs[0] == 1.0,
            left: outputs[1] == 1.0,
            right: outputs[2] == 1.0,
            backward: outputs[3] == 1.0,
        }
    }

    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_order_is_forward_left_right_backward() {
        let c = ControlState::from_outputs(&[1.0, 0.0, 1.0, 0.0]);
        assert!(c.forward && c.right);
        assert!(!c.left && !c.backward);
    }

    #[test]
    fn channels_are_not_mutually_exclusive() {
        let c = ControlState::from_outputs(&[1.0, 1.0, 0.0, 1.0]);
        assert!(c.forward && c.left && c.backward);
        assert!(c.any());
        assert!(!ControlState::NONE.any());
    }
}
