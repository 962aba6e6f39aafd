use std::fs;

use rlexp::{
    algo::Algorithm,
    config::ExperimentConfig,
    gym::EnvId,
    runner::{self, RunOptions},
};

/// Small networks and short rollouts so every algorithm updates a few times in a short run
fn quick_config() -> ExperimentConfig {
    ExperimentConfig::from_toml(
        r#"
        hidden_layers = [32]

        [dqn]
        buffer_size = 1000
        batch_size = 16
        learning_starts = 50
        target_update_interval = 20

        [ppo]
        n_steps = 64
        n_epochs = 2
        batch_size = 16

        [a2c]
        n_steps = 8

        [trpo]
        n_steps = 64
        vf_iters = 2
        vf_batch_size = 32
        "#,
    )
    .unwrap()
}

fn quick_run(env: EnvId, algorithm: Algorithm, timesteps: u64) -> runner::RunSummary {
    let options = RunOptions {
        config: quick_config(),
        seed: 7,
        ..RunOptions::new(env, algorithm, timesteps)
    };
    runner::run(&options).unwrap()
}

#[test]
fn every_algorithm_trains_on_cartpole() {
    for algorithm in Algorithm::ALL {
        let summary = quick_run(EnvId::CartPoleV1, algorithm, 300);

        assert_eq!(summary.timesteps, 300, "{algorithm}");
        assert_eq!(summary.seed, 7, "{algorithm}");
        assert!(summary.episodes > 0, "{algorithm}");
        // CartPole pays 1 per step, every episode lasts at least one step
        assert!(summary.mean_reward >= 1.0, "{algorithm}");
        assert!(summary.best_mean_reward >= summary.mean_reward, "{algorithm}");
        assert!(summary.fps > 0.0, "{algorithm}");
    }
}

#[test]
fn time_limited_environments_end_episodes() {
    // A random policy never reaches the MountainCar goal, so each episode hits the 200 step limit
    let summary = quick_run(EnvId::MountainCarV0, Algorithm::A2c, 400);
    assert_eq!(summary.episodes, 2);
    assert_eq!(summary.mean_reward, -200.0);

    let summary = quick_run(EnvId::AcrobotV1, Algorithm::Ppo, 200);
    assert_eq!(summary.timesteps, 200);
    assert!(summary.mean_reward < 0.0);
}

#[test]
fn save_path_receives_checkpoints() {
    let dir = std::env::temp_dir().join(format!("rlexp-training-{}", std::process::id()));
    let options = RunOptions {
        config: quick_config(),
        save_path: Some(dir.clone()),
        ..RunOptions::new(EnvId::CartPoleV0, Algorithm::Ppo, 100)
    };

    runner::run(&options).unwrap();

    assert!(dir.join("ppo_actor.bin").exists());
    assert!(dir.join("ppo_critic.bin").exists());
    fs::remove_dir_all(&dir).unwrap();
}
