pub mod training_manager;
