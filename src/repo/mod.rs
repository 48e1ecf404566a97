pub mod device_repo;
