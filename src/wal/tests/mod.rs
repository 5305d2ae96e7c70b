mod tests_corruption;
mod tests_edge_cases;
