pub mod mock_cpu;
