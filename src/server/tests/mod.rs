mod mock_host;
