mod waypoints_test;
