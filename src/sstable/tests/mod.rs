mod tests_pool;
mod tests_reader;
