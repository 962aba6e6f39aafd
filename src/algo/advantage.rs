//! Return and advantage estimation shared by the on-policy agents
//!
//! Every function works on one rollout stored in time order. `dones[t]` is true when transition `t`
//! ended its episode, in which case nothing is bootstrapped across it. `last_value` is V of the state
//! following the final transition, 0 when that transition was terminal.

/// Discounted n-step returns: `R_t = r_t + γ·R_{t+1}`, seeded with `last_value`
pub fn discounted_returns(rewards: &[f32], dones: &[bool], last_value: f32, gamma: f32) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), dones.len());

    let mut returns = vec![0.0; rewards.len()];
    let mut running = last_value;
    for t in (0..rewards.len()).rev() {
        if dones[t] {
            running = 0.0;
        }
        running = rewards[t] + gamma * running;
        returns[t] = running;
    }
    returns
}

/// Generalized Advantage Estimation
///
/// `δ_t = r_t + γ·V(s_{t+1}) − V(s_t)` and `A_t = δ_t + γλ·A_{t+1}`, cut at episode ends.
/// Returns `(advantages, returns)` with `returns = advantages + values`.
pub fn gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    debug_assert_eq!(values.len(), n);
    debug_assert_eq!(dones.len(), n);

    let mut advantages = vec![0.0; n];
    let mut next_value = last_value;
    let mut running = 0.0;
    for t in (0..n).rev() {
        let live = if dones[t] { 0.0 } else { 1.0 };
        let delta = rewards[t] + gamma * next_value * live - values[t];
        running = delta + gamma * lambda * live * running;
        advantages[t] = running;
        next_value = values[t];
    }

    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    (advantages, returns)
}

/// Shift to zero mean and scale to unit standard deviation, in place
///
/// Slices with fewer than two values are left alone.
pub fn normalize(values: &mut [f32]) {
    if values.len() < 2 {
        return;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt() + 1e-8;
    values.iter_mut().for_each(|v| *v = (*v - mean) / std);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_discounted_returns_bootstrap() {
        let returns = discounted_returns(&[1.0, 1.0, 1.0], &[false, false, false], 10.0, 0.5);
        // 1 + 0.5 * (1 + 0.5 * (1 + 0.5 * 10))
        assert_close(&returns, &[3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_discounted_returns_stop_at_episode_end() {
        let returns = discounted_returns(&[1.0, 2.0, 3.0], &[false, true, false], 100.0, 1.0);
        assert_close(&returns, &[3.0, 2.0, 103.0]);
    }

    #[test]
    fn test_gae_lambda_one_matches_monte_carlo() {
        let rewards = [1.0, 0.0, 2.0];
        let values = [0.5, 0.3, 0.1];
        let dones = [false, false, true];

        let (advantages, returns) = gae(&rewards, &values, &dones, 7.0, 0.9, 1.0);

        let expected_returns = discounted_returns(&rewards, &dones, 7.0, 0.9);
        assert_close(&returns, &expected_returns);
        let expected_advantages = expected_returns
            .iter()
            .zip(values)
            .map(|(r, v)| r - v)
            .collect::<Vec<_>>();
        assert_close(&advantages, &expected_advantages);
    }

    #[test]
    fn test_gae_lambda_zero_is_td_residual() {
        let rewards = [1.0, 1.0];
        let values = [2.0, 3.0];
        let (advantages, _) = gae(&rewards, &values, &[false, false], 4.0, 0.5, 0.0);
        // δ_0 = 1 + 0.5·3 − 2, δ_1 = 1 + 0.5·4 − 3
        assert_close(&advantages, &[0.5, 0.0]);
    }

    #[test]
    fn test_gae_does_not_leak_across_episodes() {
        let (advantages, _) = gae(&[0.0, 5.0], &[0.0, 0.0], &[true, false], 0.0, 0.99, 0.95);
        assert_close(&advantages, &[0.0, 5.0]);
    }

    #[test]
    fn test_normalize() {
        let mut values = [1.0, 2.0, 3.0, 4.0];
        normalize(&mut values);
        let mean = values.iter().sum::<f32>() / 4.0;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-4);

        let mut single = [3.0];
        normalize(&mut single);
        assert_eq!(single, [3.0]);
    }
}
