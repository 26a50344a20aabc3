use crate::normalizer::StateNormalizer;
use std::collections::VecDeque;

/// One timestep of context: the (state, action, return-to-go) triple plus the reward channel that
/// only carries data during training.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: Vec<f32>,
    pub action: Vec<f32>,
    pub return_to_go: f32,
    pub reward: f32,
}

impl Step {
    pub fn new(state: Vec<f32>, action: Vec<f32>, return_to_go: f32) -> Self {
        Self {
            state,
            action,
            return_to_go,
            reward: 0.,
        }
    }
}

/// Fixed length context, left padded. Fields are stored flat, row major over the K positions.
/// Padded positions are zero in every field and 0 in the mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub context_len: usize,
    pub state_size: usize,
    pub action_size: usize,
    pub states: Vec<f32>,
    pub actions: Vec<f32>,
    pub rewards: Vec<f32>,
    pub returns_to_go: Vec<f32>,
    pub mask: Vec<u8>,
}

impl Window {
    /// All padding.
    pub fn empty(context_len: usize, state_size: usize, action_size: usize) -> Self {
        Self {
            context_len,
            state_size,
            action_size,
            states: vec![0.; context_len * state_size],
            actions: vec![0.; context_len * action_size],
            rewards: vec![0.; context_len],
            returns_to_go: vec![0.; context_len],
            mask: vec![0; context_len],
        }
    }

    /// Writes a real step at `pos` and marks it in the mask.
    pub fn set(&mut self, pos: usize, state: &[f32], action: &[f32], reward: f32, rtg: f32) {
        let s = pos * self.state_size;
        self.states[s..s + self.state_size].copy_from_slice(state);
        let a = pos * self.action_size;
        self.actions[a..a + self.action_size].copy_from_slice(action);
        self.rewards[pos] = reward;
        self.returns_to_go[pos] = rtg;
        self.mask[pos] = 1;
    }

    /// Left pads the given steps, keeping only the trailing `context_len` of them.
    pub fn from_steps<'a>(
        steps: impl ExactSizeIterator<Item = &'a Step>,
        context_len: usize,
        state_size: usize,
        action_size: usize,
    ) -> Self {
        let mut window = Self::empty(context_len, state_size, action_size);
        let real_len = steps.len().min(context_len);
        let pad_len = context_len - real_len;
        let skip = steps.len() - real_len;
        for (offset, step) in steps.skip(skip).enumerate() {
            window.set(
                pad_len + offset,
                &step.state,
                &step.action,
                step.reward,
                step.return_to_go,
            );
        }
        window
    }

    pub fn real_len(&self) -> usize {
        self.mask.iter().filter(|m| **m > 0).count()
    }

    pub fn pad_len(&self) -> usize {
        self.context_len - self.real_len()
    }

    /// With left padding the last real position is always the final slot, unless the window is
    /// all padding.
    pub fn last_real_index(&self) -> Option<usize> {
        self.mask.iter().rposition(|m| *m > 0)
    }

    pub fn state(&self, pos: usize) -> &[f32] {
        &self.states[pos * self.state_size..(pos + 1) * self.state_size]
    }

    pub fn action(&self, pos: usize) -> &[f32] {
        &self.actions[pos * self.action_size..(pos + 1) * self.action_size]
    }

    /// Normalizes the states of real positions, padding stays zero.
    pub fn normalized(mut self, normalizer: &StateNormalizer) -> Self {
        for pos in 0..self.context_len {
            if self.mask[pos] == 0 {
                continue;
            }
            let s = pos * self.state_size;
            let normalized = normalizer.normalize(&self.states[s..s + self.state_size]);
            self.states[s..s + self.state_size].copy_from_slice(&normalized);
        }
        self
    }
}

/// Growing sequence of steps of which only the trailing K are ever read. Callers truncate after
/// each append to keep memory bounded.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    pub state_size: usize,
    pub action_size: usize,
    steps: VecDeque<Step>,
}

impl WindowBuffer {
    pub fn new(state_size: usize, action_size: usize) -> Self {
        Self {
            state_size,
            action_size,
            steps: VecDeque::new(),
        }
    }

    pub fn append(&mut self, step: Step) {
        debug_assert_eq!(step.state.len(), self.state_size);
        debug_assert_eq!(step.action.len(), self.action_size);
        self.steps.push_back(step);
    }

    /// Drops everything but the trailing `k` steps.
    pub fn truncate(&mut self, k: usize) {
        while self.steps.len() > k {
            self.steps.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.back()
    }

    pub fn last_k(&self, k: usize) -> Window {
        Window::from_steps(self.steps.iter(), k, self.state_size, self.action_size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn step(v: f32) -> Step {
        Step::new(vec![v, v], vec![v], v)
    }

    #[test]
    fn short_buffer_is_left_padded() {
        let mut buffer = WindowBuffer::new(2, 1);
        for i in 1..=3 {
            buffer.append(step(i as f32));
        }
        let window = buffer.last_k(5);
        assert_eq!(window.mask, vec![0, 0, 1, 1, 1]);
        assert_eq!(window.states.len(), 10);
        assert_eq!(&window.states[..4], &[0.; 4]);
        assert_eq!(&window.actions[..2], &[0.; 2]);
        assert_eq!(&window.returns_to_go, &[0., 0., 1., 2., 3.]);
        assert_eq!(window.last_real_index(), Some(4));
    }

    #[test]
    fn empty_buffer_is_all_padding() {
        let buffer = WindowBuffer::new(3, 2);
        let window = buffer.last_k(4);
        assert_eq!(window.real_len(), 0);
        assert_eq!(window.pad_len(), 4);
        assert_eq!(window.last_real_index(), None);
        assert!(window.states.iter().all(|s| *s == 0.));
    }

    #[test]
    fn long_buffer_keeps_trailing_steps() {
        let mut buffer = WindowBuffer::new(2, 1);
        for i in 0..10 {
            buffer.append(step(i as f32));
        }
        let window = buffer.last_k(3);
        assert_eq!(window.returns_to_go, vec![7., 8., 9.]);
        assert_eq!(window.pad_len(), 0);
        buffer.truncate(3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.last_k(3), window);
    }

    #[test]
    fn normalization_skips_padding() {
        let mut buffer = WindowBuffer::new(2, 1);
        buffer.append(step(3.));
        let normalizer = StateNormalizer::new(vec![1., 1.], vec![2., 2.]);
        let window = buffer.last_k(2).normalized(&normalizer);
        assert_eq!(window.state(0), &[0., 0.]);
        assert_eq!(window.state(1), &[1., 1.]);
    }
}
