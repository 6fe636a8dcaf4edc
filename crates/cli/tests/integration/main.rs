mod layer_tests;
mod pack_tests;
