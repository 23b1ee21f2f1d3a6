mod builder;
mod test_utils;
