mod control_test;
mod expression_test;
mod routine_test;
